//! Device buffers split into render-sized blocks.

use crate::RenderSource;

/// Render interleaved `out` (`channels` samples per frame) through `source` in
/// chunks of at most `block_size` frames.
pub fn render_in_blocks<S>(source: &mut S, out: &mut [i16], channels: usize, block_size: usize)
where
    S: RenderSource + ?Sized,
{
    if channels == 0 || block_size == 0 {
        out.fill(0);
        return;
    }
    for chunk in out.chunks_mut(block_size * channels) {
        let frames = chunk.len() / channels;
        source.render(chunk, channels, frames);
    }
}
