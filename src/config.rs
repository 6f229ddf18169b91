//! Configuration parameters for analysis

/// Quality preset controlling FFT size / hop trade-offs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quality {
    /// 1024-point FFT, 512 hop. Coarsest spectra, fastest.
    Fast,
    /// 2048-point FFT, 512 hop (default)
    Balanced,
    /// 4096-point FFT, 1024 hop. Finest frequency resolution.
    Accurate,
}

impl Quality {
    /// FFT frame size for this preset
    pub fn fft_size(self) -> usize {
        match self {
            Quality::Fast => 1024,
            Quality::Balanced => 2048,
            Quality::Accurate => 4096,
        }
    }

    /// Hop size for this preset
    pub fn hop_size(self) -> usize {
        match self {
            Quality::Fast => 512,
            Quality::Balanced => 512,
            Quality::Accurate => 1024,
        }
    }
}

/// Which analyzers to run
///
/// One flag per analyzer so that adding or removing an analyzer is a
/// compile-checked change. All analyzers are enabled by default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSet {
    /// ITU-R BS.1770-class loudness meter
    pub loudness: bool,
    /// 4x oversampled true-peak detector
    pub true_peak: bool,
    /// RMS/peak/crest/clipping/DC analyzer
    pub dynamics: bool,
    /// Centroid/rolloff/flux/harmonicity extractor
    pub spectral: bool,
    /// Correlation/width/balance analyzer
    pub stereo: bool,
    /// Four-band tonal balance analyzer
    pub tonal_balance: bool,
    /// BPM and transient analyzer
    pub rhythm: bool,
    /// Chroma/key analyzer
    pub key: bool,
}

impl FeatureSet {
    /// All analyzers enabled
    pub fn all() -> Self {
        Self {
            loudness: true,
            true_peak: true,
            dynamics: true,
            spectral: true,
            stereo: true,
            tonal_balance: true,
            rhythm: true,
            key: true,
        }
    }

    /// No analyzers enabled (build up from here for targeted runs)
    pub fn none() -> Self {
        Self {
            loudness: false,
            true_peak: false,
            dynamics: false,
            spectral: false,
            stereo: false,
            tonal_balance: false,
            rhythm: false,
            key: false,
        }
    }
}

impl Default for FeatureSet {
    fn default() -> Self {
        Self::all()
    }
}

/// Analysis configuration
///
/// Passed explicitly into [`crate::analyze`]; the engine holds no
/// process-wide mutable configuration.
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    /// Analyzers to run (default: all)
    pub features: FeatureSet,

    /// FFT size/hop preset for STFT-based analyzers (default: Balanced)
    pub quality: Quality,

    /// Per-analyzer wall-clock budget in milliseconds.
    /// `None` derives one quarter of `total_budget_ms`.
    pub per_feature_timeout_ms: Option<u64>,

    /// Total processing budget in milliseconds (default: 30_000)
    pub total_budget_ms: u64,

    /// Reference level for headroom and loudness suggestions
    /// (default: -23.0 LUFS, the broadcast target)
    pub reference_loudness_lufs: f64,

    /// Minimum BPM for the rhythm search (default: 60.0)
    pub min_bpm: f32,

    /// Maximum BPM for the rhythm search (default: 180.0)
    pub max_bpm: f32,

    /// Spectral rolloff percentiles to report, in percent (default: [85, 95])
    pub rolloff_percentiles: Vec<f32>,
}

impl AnalysisOptions {
    /// Effective per-feature budget in milliseconds
    pub fn feature_timeout_ms(&self) -> u64 {
        self.per_feature_timeout_ms
            .unwrap_or(self.total_budget_ms / 4)
    }
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            features: FeatureSet::all(),
            quality: Quality::Balanced,
            per_feature_timeout_ms: None,
            total_budget_ms: 30_000,
            reference_loudness_lufs: -23.0,
            min_bpm: 60.0,
            max_bpm: 180.0,
            rolloff_percentiles: vec![85.0, 95.0],
        }
    }
}
