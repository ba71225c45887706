use std::path::{Path, PathBuf};

use crate::audio::fragment::Fragment;
use crate::audio::wav::read_wav;
use crate::synth::request::SynthesisRequest;
use crate::synth::{SynthesisError, Synthesizer};

/// Offline synthesizer serving pre-rendered fragments from `<root>/<fingerprint>.wav`.
///
/// Pairs with the request manifest written by `panelwave plan`: an external tool renders each
/// listed fingerprint, and `panelwave render` picks the files up here.
#[derive(Clone, Debug)]
pub struct DirectorySynthesizer {
    root: PathBuf,
}

impl DirectorySynthesizer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, request: &SynthesisRequest) -> PathBuf {
        self.root.join(format!("{}.wav", request.fingerprint()))
    }
}

impl Synthesizer for DirectorySynthesizer {
    fn synthesize(&self, request: &SynthesisRequest) -> Result<Fragment, SynthesisError> {
        let path = self.path_for(request);
        if !path.is_file() {
            return Err(SynthesisError::failure(format!(
                "no fragment at '{}'",
                path.display()
            )));
        }
        read_wav(&path).map_err(|e| SynthesisError::failure(e.to_string()))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/synth/directory.rs"]
mod tests;
