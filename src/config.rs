/// How many races a single location reports.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum ReportingPolicy {
    /// Every unordered access pair counts, including repeats on a location which already raced.
    #[default]
    EveryRace,
    /// Only the first race on a location counts. Later races on it are still detected but not
    /// counted, recorded or logged.
    FirstPerLocation,
}

/// Runtime options of a [Detector](crate::Detector).
///
/// The maximum number of threads is not part of this struct: it sizes every vector clock and is
/// therefore the const generic `K` of the detector.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Config {
    pub reporting: ReportingPolicy,

    /// How many [RaceEvent](crate::RaceEvent)s each location retains. The race count keeps
    /// growing after this many events have been recorded.
    pub max_recorded_events: usize,
}

impl Config {
    pub const DEFAULT_MAX_RECORDED_EVENTS: usize = 64;

    pub fn with_reporting(mut self, reporting: ReportingPolicy) -> Self {
        self.reporting = reporting;
        self
    }

    pub fn with_max_recorded_events(mut self, max_recorded_events: usize) -> Self {
        self.max_recorded_events = max_recorded_events;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            reporting: ReportingPolicy::default(),
            max_recorded_events: Self::DEFAULT_MAX_RECORDED_EVENTS,
        }
    }
}
