use serde::{Deserialize, Serialize};

/// How a stencil tap that falls outside the image is resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BorderMode {
    /// The tap is dropped from the weighted sum. Weights are not renormalized.
    #[default]
    Skip,
    Clamp,
    Reflect101,
}

impl BorderMode {
    pub fn name(self) -> &'static str {
        match self {
            Self::Skip => "skip",
            Self::Clamp => "clamp",
            Self::Reflect101 => "reflect101",
        }
    }
}

/// Maps a possibly out-of-range index into `[0, len)`.
///
/// In-range indices map to themselves under every mode. `None` means the tap
/// contributes nothing.
pub fn map_index(i: isize, len: usize, mode: BorderMode) -> Option<usize> {
    if len == 0 {
        return None;
    }
    if i >= 0 && (i as usize) < len {
        return Some(i as usize);
    }

    match mode {
        BorderMode::Skip => None,
        BorderMode::Clamp => {
            if i < 0 {
                Some(0)
            } else {
                Some(len - 1)
            }
        }
        BorderMode::Reflect101 => {
            if len == 1 {
                return Some(0);
            }

            let period = (2 * len - 2) as isize;
            let r = i.rem_euclid(period) as usize;
            if r < len {
                Some(r)
            } else {
                Some((2 * len - 2) - r)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{BorderMode, map_index};

    #[test]
    fn skip_drops_out_of_range_taps() {
        let mode = BorderMode::Skip;

        assert_eq!(map_index(-1, 5, mode), None);
        assert_eq!(map_index(0, 5, mode), Some(0));
        assert_eq!(map_index(4, 5, mode), Some(4));
        assert_eq!(map_index(5, 5, mode), None);
        assert_eq!(map_index(0, 0, mode), None);
    }

    #[test]
    fn clamp_mapping_handles_negative_and_overflow() {
        let mode = BorderMode::Clamp;

        assert_eq!(map_index(-3, 5, mode), Some(0));
        assert_eq!(map_index(-1, 5, mode), Some(0));
        assert_eq!(map_index(2, 5, mode), Some(2));
        assert_eq!(map_index(5, 5, mode), Some(4));
        assert_eq!(map_index(99, 5, mode), Some(4));
    }

    #[test]
    fn reflect101_len1_len2_len5() {
        let mode = BorderMode::Reflect101;

        for i in -8..=8 {
            assert_eq!(map_index(i, 1, mode), Some(0));
        }

        let expected_len2 = [0, 1, 0, 1, 0, 1, 0, 1, 0];
        for (offset, expected) in (-4..=4).zip(expected_len2) {
            assert_eq!(map_index(offset, 2, mode), Some(expected));
        }

        let cases_len5 = [(-4, 4), (-2, 2), (-1, 1), (0, 0), (4, 4), (5, 3), (7, 1)];
        for (i, expected) in cases_len5 {
            assert_eq!(map_index(i, 5, mode), Some(expected));
        }
    }

    #[test]
    fn border_mode_names_round_trip_through_serde() {
        let parsed: BorderMode = serde_json::from_str("\"reflect101\"").expect("valid mode");
        assert_eq!(parsed, BorderMode::Reflect101);
        assert_eq!(BorderMode::default(), BorderMode::Skip);
    }
}
