use chunk::Range;
use std::time::Duration;

/// A dimension of the world, fixing its vertical range, persistence ID and
/// environmental rules.
///
/// `OverworldLegacy` is the overworld as worlds predating the extended height
/// range stored it: the old `[0, 255]` range under the same persistence ID.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Dimension {
    Overworld,
    Nether,
    End,
    OverworldLegacy,
}

impl Dimension {
    /// Look up a dimension by its registration ID. The legacy overworld is
    /// registered under 10 to keep it distinct from the current one.
    pub fn by_id(id: i32) -> Option<Dimension> {
        match id {
            0 => Some(Dimension::Overworld),
            1 => Some(Dimension::Nether),
            2 => Some(Dimension::End),
            10 => Some(Dimension::OverworldLegacy),
            _ => None,
        }
    }

    /// The ID used in persistence keys. The legacy overworld collapses to 0.
    pub fn id(self) -> i32 {
        match self {
            Dimension::Overworld | Dimension::OverworldLegacy => 0,
            Dimension::Nether => 1,
            Dimension::End => 2,
        }
    }

    /// The lowest and highest Y coordinates a block may occupy.
    pub fn range(self) -> Range {
        match self {
            Dimension::Overworld => Range(-64, 319),
            Dimension::Nether => Range(0, 127),
            Dimension::End => Range(0, 255),
            Dimension::OverworldLegacy => Range(0, 255),
        }
    }

    pub fn water_evaporates(self) -> bool {
        matches!(self, Dimension::Nether)
    }

    pub fn lava_spread_duration(self) -> Duration {
        match self {
            Dimension::Nether => Duration::from_millis(250),
            _ => Duration::from_millis(1500),
        }
    }

    pub fn weather_cycle(self) -> bool {
        matches!(self, Dimension::Overworld | Dimension::OverworldLegacy)
    }

    pub fn time_cycle(self) -> bool {
        matches!(self, Dimension::Overworld | Dimension::OverworldLegacy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip() {
        for dim in [Dimension::Overworld, Dimension::Nether, Dimension::End] {
            assert_eq!(Dimension::by_id(dim.id()), Some(dim));
        }
        assert_eq!(Dimension::by_id(10), Some(Dimension::OverworldLegacy));
        assert_eq!(Dimension::OverworldLegacy.id(), 0);
        assert_eq!(Dimension::by_id(3), None);
    }

    #[test]
    fn ranges() {
        assert_eq!(Dimension::Overworld.range(), Range(-64, 319));
        assert_eq!(Dimension::Nether.range(), Range(0, 127));
        assert_eq!(Dimension::End.range(), Range(0, 255));
        assert_eq!(Dimension::OverworldLegacy.range(), Range(0, 255));
    }

    #[test]
    fn environment_rules() {
        assert!(Dimension::Nether.water_evaporates());
        assert!(!Dimension::Overworld.water_evaporates());
        assert!(Dimension::Overworld.weather_cycle());
        assert!(!Dimension::End.time_cycle());
        assert!(Dimension::Nether.lava_spread_duration() < Dimension::End.lava_spread_duration());
    }
}
