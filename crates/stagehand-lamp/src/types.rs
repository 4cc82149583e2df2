/// Current pan/tilt output plus the fixed geometry the lamp loop needs to
/// turn a stage point into an angle.
#[derive(Debug, Clone, Copy)]
pub struct LampState {
    pub current_pan_deg: f64,
    pub current_tilt_deg: f64,
    pub max_pan_deg: f64,
    pub max_tilt_deg: f64,
    pub origin: (f64, f64, f64),
}

impl LampState {
    pub fn new(max_pan_deg: f64, max_tilt_deg: f64, origin: (f64, f64, f64)) -> Self {
        Self {
            current_pan_deg: 0.0,
            current_tilt_deg: 0.0,
            max_pan_deg,
            max_tilt_deg,
            origin,
        }
    }
}

/// A 512-channel DMX universe buffer.
#[derive(Debug, Clone)]
pub struct DmxUniverse {
    pub id: u16,
    pub channels: [u8; 512],
}

impl DmxUniverse {
    pub fn new(id: u16) -> Self {
        Self {
            id,
            channels: [0u8; 512],
        }
    }

    /// Sets `values.len()` bytes starting at `start_address` (1-indexed,
    /// matching DMX convention) to `values`. Silently clips to the 512-byte
    /// buffer rather than erroring: an out-of-range channel map is a
    /// configuration mistake, not a runtime fault.
    pub fn set(&mut self, start_address: u16, values: &[u8]) {
        let start = (start_address as usize).saturating_sub(1);
        if start >= self.channels.len() {
            return;
        }
        let end = (start + values.len()).min(self.channels.len());
        self.channels[start..end].copy_from_slice(&values[..end - start]);
    }
}

/// Named channel -> (start_address, width) map for a single universe, as
/// `LightController.add_channel` builds it in the original tracker.
#[derive(Debug, Clone)]
pub struct ChannelMap {
    entries: Vec<(String, u16, u8)>,
}

impl ChannelMap {
    /// The defaults specified for the performer tracker's fixture: pan=18,
    /// tilt=20, shutter=1, dimmer=2, each one byte wide.
    pub fn defaults() -> Self {
        let mut map = Self::new();
        map.add_channel("pan", 18, 1);
        map.add_channel("tilt", 20, 1);
        map.add_channel("shutter", 1, 1);
        map.add_channel("dimmer", 2, 1);
        map
    }

    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    pub fn add_channel(&mut self, name: &str, start_address: u16, width: u8) {
        self.entries.push((name.to_string(), start_address, width));
    }

    pub fn lookup(&self, name: &str) -> Option<(u16, u8)> {
        self.entries
            .iter()
            .find(|(n, _, _)| n == name)
            .map(|(_, start, width)| (*start, *width))
    }
}

impl Default for ChannelMap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_performer_tracker_fixture() {
        let map = ChannelMap::defaults();
        assert_eq!(map.lookup("pan"), Some((18, 1)));
        assert_eq!(map.lookup("tilt"), Some((20, 1)));
        assert_eq!(map.lookup("shutter"), Some((1, 1)));
        assert_eq!(map.lookup("dimmer"), Some((2, 1)));
    }

    #[test]
    fn dmx_universe_set_is_one_indexed() {
        let mut universe = DmxUniverse::new(0);
        universe.set(1, &[42]);
        assert_eq!(universe.channels[0], 42);
    }

    #[test]
    fn dmx_universe_set_clips_to_buffer_end() {
        let mut universe = DmxUniverse::new(0);
        universe.set(511, &[1, 2, 3]);
        assert_eq!(universe.channels[510], 1);
        assert_eq!(universe.channels[511], 2);
    }
}
