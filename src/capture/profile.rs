/// Fixed encoder profile for all sessions.
///
/// The worker does not negotiate codecs: every session uses the same
/// 128 kbit/s-equivalent profile at 44.1 kHz, with the channel count
/// taken from the device default at open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderProfile {
    /// Target bit rate in bits per second.
    pub bit_rate: u32,
    /// Sample rate in Hz.
    pub sample_rate: u32,
    /// Bits per stored sample.
    pub bits_per_sample: u16,
}

impl Default for EncoderProfile {
    fn default() -> Self {
        Self {
            bit_rate: 128_000,
            sample_rate: 44_100,
            bits_per_sample: 16,
        }
    }
}
