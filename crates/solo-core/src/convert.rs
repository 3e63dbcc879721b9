//! Float channel buffers to interleaved 16-bit device samples.

/// Scale a `[-1.0, 1.0]` sample to `i16`, clamping out-of-range values.
#[inline]
pub fn sample_to_i16(sample: f32) -> i16 {
    (sample as f64 * 32768.0).clamp(-32768.0, 32767.0) as i16
}

/// Interleave `frames` frames of planar `channels` into `out`.
///
/// Only the first `min(device_channels, channels.len())` device channels are
/// written from the source; any further device channels are silenced.
pub fn interleave_i16<'a, I>(channels: I, out: &mut [i16], device_channels: usize, frames: usize)
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let used = (frames * device_channels).min(out.len());
    out[..used].fill(0);
    if device_channels == 0 {
        return;
    }

    for (ch, source) in channels.into_iter().take(device_channels).enumerate() {
        for (frame, &sample) in source.iter().take(frames).enumerate() {
            if let Some(slot) = out.get_mut(frame * device_channels + ch) {
                *slot = sample_to_i16(sample);
            }
        }
    }
}
