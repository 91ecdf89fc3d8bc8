//! Shared audio graph.
//!
//! Every audio stream touching the session — microphone input and any
//! synthesized playback — routes into one destination so the single
//! recorded audio track reflects everything the user heard and said.
//! Only the media pipeline attaches or detaches inputs.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::sources::AudioSource;

/// Mix several sample buffers into one, saturating on overflow.
///
/// Shorter inputs are treated as zero-padded to the longest length.
#[must_use]
pub fn mix_samples(inputs: &[Vec<i16>]) -> Vec<i16> {
    let len = inputs.iter().map(Vec::len).max().unwrap_or(0);
    let mut out = vec![0i16; len];
    for input in inputs {
        for (acc, sample) in out.iter_mut().zip(input.iter()) {
            *acc = acc.saturating_add(*sample);
        }
    }
    out
}

/// All session audio mixed into one destination.
#[derive(Default)]
pub struct AudioGraph {
    inputs: Mutex<Vec<Arc<dyn AudioSource>>>,
}

impl AudioGraph {
    /// Empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an input. Hosts route playback through the pipeline's
    /// attach method; only the pipeline touches the graph directly.
    pub(crate) fn attach(&self, source: Arc<dyn AudioSource>) {
        debug!(label = source.label(), "audio input attached");
        self.inputs.lock().push(source);
    }

    /// Detach an input by label. Unknown labels are ignored.
    pub(crate) fn detach(&self, label: &str) {
        let mut inputs = self.inputs.lock();
        inputs.retain(|s| s.label() != label);
    }

    /// Number of attached inputs.
    #[must_use]
    pub fn input_count(&self) -> usize {
        self.inputs.lock().len()
    }

    /// Drain every input and mix the results into one buffer.
    #[must_use]
    pub fn mix_next(&self) -> Vec<i16> {
        let inputs = self.inputs.lock();
        let drained: Vec<Vec<i16>> = inputs.iter().map(|s| s.drain()).collect();
        mix_samples(&drained)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::FakeAudioSource;

    #[test]
    fn mix_adds_overlapping_samples() {
        let mixed = mix_samples(&[vec![100, 200, 300], vec![10, 20, 30]]);
        assert_eq!(mixed, vec![110, 220, 330]);
    }

    #[test]
    fn mix_pads_shorter_inputs() {
        let mixed = mix_samples(&[vec![5], vec![1, 2, 3]]);
        assert_eq!(mixed, vec![6, 2, 3]);
    }

    #[test]
    fn mix_saturates_instead_of_wrapping() {
        let mixed = mix_samples(&[vec![i16::MAX], vec![100]]);
        assert_eq!(mixed, vec![i16::MAX]);

        let mixed = mix_samples(&[vec![i16::MIN], vec![-100]]);
        assert_eq!(mixed, vec![i16::MIN]);
    }

    #[test]
    fn mix_of_nothing_is_empty() {
        assert!(mix_samples(&[]).is_empty());
        assert!(mix_samples(&[vec![], vec![]]).is_empty());
    }

    #[test]
    fn graph_mixes_attached_inputs() {
        let graph = AudioGraph::new();
        let mic = Arc::new(FakeAudioSource::new("microphone"));
        let playback = Arc::new(FakeAudioSource::new("playback"));
        mic.push(vec![100, 100]);
        playback.push(vec![-40, 60, 10]);

        graph.attach(mic);
        graph.attach(playback);
        assert_eq!(graph.input_count(), 2);

        assert_eq!(graph.mix_next(), vec![60, 160, 10]);
        // Drained — next mix is empty.
        assert!(graph.mix_next().is_empty());
    }

    #[test]
    fn detach_removes_by_label() {
        let graph = AudioGraph::new();
        let mic = Arc::new(FakeAudioSource::new("microphone"));
        let playback = Arc::new(FakeAudioSource::new("playback"));
        graph.attach(mic);
        graph.attach(Arc::clone(&playback) as Arc<dyn AudioSource>);

        graph.detach("playback");
        assert_eq!(graph.input_count(), 1);

        playback.push(vec![999]);
        assert!(graph.mix_next().is_empty());
    }
}
