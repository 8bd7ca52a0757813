//! Speed to sector dwell lookup.
//!
//! `STEP_DELAY_US[v]` is the time between two commutation edges that makes the
//! tachometer read `v` km/h. It has to be regenerated if the motor changes.

/// Highest speed the dial can show.
pub const SPEED_MAX_KMH: u32 = 160;

/// Below this the needle is not accurate enough and the drive is disengaged.
pub const SPEED_MIN_KMH: u32 = 5;

#[rustfmt::skip]
pub const STEP_DELAY_US: [u32; SPEED_MAX_KMH as usize + 1] = [
    0, 0, 0, 0, 0, 314278, 269123, 235314, 209051, 188062,
    170904, 156614, 144530, 134177, 125208, 117363, 110443, 104293, 98793, 93843,
    89366, 85296, 81581, 78177, 75044, 72154, 69477, 66993, 64679, 62520,
    60501, 58608, 56830, 55156, 53579, 52089, 50679, 49344, 48078, 46875,
    45730, 44640, 43601, 42609, 41662, 40755, 39887, 39056, 38258, 37492,
    36757, 36049, 35368, 34713, 34081, 33472, 32885, 32317, 31769, 31239,
    30727, 30231, 29751, 29286, 28835, 28398, 27974, 27562, 27162, 26774,
    26397, 26030, 25673, 25326, 24988, 24659, 24339, 24027, 23722, 23426,
    23136, 22854, 22579, 22310, 22047, 21791, 21540, 21295, 21056, 20822,
    20593, 20369, 20150, 19935, 19725, 19520, 19318, 19121, 18928, 18739,
    18553, 18371, 18193, 18018, 17846, 17678, 17512, 17350, 17191, 17035,
    16881, 16730, 16582, 16437, 16294, 16153, 16015, 15879, 15746, 15614,
    15485, 15358, 15234, 15111, 14990, 14871, 14754, 14638, 14525, 14413,
    14303, 14195, 14088, 13983, 13879, 13777, 13676, 13577, 13480, 13383,
    13288, 13195, 13102, 13011, 12922, 12833, 12746, 12660, 12575, 12491,
    12408, 12326, 12246, 12166, 12088, 12010, 11934, 11858, 11784, 11710,
    11637,
];

/// Sector dwell for `speed_kmh`, clamped to the table range.
#[inline]
pub fn step_delay_us(speed_kmh: u32) -> u32 {
    STEP_DELAY_US[speed_kmh.min(SPEED_MAX_KMH) as usize]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disengaged_below_minimum() {
        for v in 0..SPEED_MIN_KMH {
            assert_eq!(step_delay_us(v), 0);
        }
        assert!(step_delay_us(SPEED_MIN_KMH) > 0);
    }

    #[test]
    fn monotonically_non_increasing() {
        let engaged = &STEP_DELAY_US[SPEED_MIN_KMH as usize..];
        assert!(engaged.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn clamps_above_max() {
        assert_eq!(step_delay_us(SPEED_MAX_KMH), 11637);
        assert_eq!(step_delay_us(SPEED_MAX_KMH + 1), 11637);
        assert_eq!(step_delay_us(u32::MAX), 11637);
        assert_eq!(step_delay_us(60), 30727);
    }
}
