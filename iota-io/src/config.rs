//! Run configuration for IOTA
//!
//! [`RawConfig`] holds the values exactly as the user supplied them, with
//! times in milliseconds and the effect and block lists as loose tokens.
//! [`Config::from_raw`] validates everything, parses the token lists and
//! fills in random filter defaults. [`Config::resolve`] turns the result into
//! sample-based [`SynthParams`] once the source sample rate is known.

use iota_audio::{
    Block, EffectKind, EffectSpec, FilterMode, FilterParams, GeneratorMode, MasteringParams,
    SynthParams, MIN_ATTENUATION_DB,
};
use rand::Rng;
use std::path::PathBuf;
use thiserror::Error;

/// Highest accepted filter cutoff or transition width (Hz)
pub const MAX_FILTER_HZ: f32 = 20000.0;
/// Highest accepted filter attenuation (dB)
pub const MAX_ATTENUATION_DB: f32 = 200.0;
/// Attenuation used when an effect leaves it out (dB)
pub const DEFAULT_ATTENUATION_DB: f32 = 60.0;

/// Errors found while validating a configuration
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("No input file specified")]
    MissingInput,
    #[error("No output file specified")]
    MissingOutput,
    #[error("{name} must be {expected}, got {value}")]
    OutOfRange {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("{0:?} is not a valid {1}")]
    InvalidNumber(String, &'static str),
    #[error("invalid or empty block list ({0} tokens, expected groups of 4)")]
    InvalidBlockList(usize),
    #[error("block {identifier:?} must end at least one grain after it starts")]
    EmptyBlock { identifier: String },
    #[error("loop length must be at least one grain long ({0:.4} seconds)")]
    LoopTooShort(f32),
    #[error("Invalid effect type {0:?}")]
    InvalidEffectType(String),
    #[error("Missing identifier for {0}")]
    MissingIdentifier(String),
    #[error("Missing strength for {0}")]
    MissingStrength(String),
    #[error("grain size of {ms} ms is shorter than one sample at {sample_rate} Hz")]
    GrainTooShort { ms: u32, sample_rate: u32 },
    #[error("{identifier:?} filter cutoff of {cutoff} Hz is not below the source Nyquist frequency ({nyquist} Hz)")]
    CutoffAboveNyquist {
        identifier: String,
        cutoff: f32,
        nyquist: f32,
    },
}

/// Generator mode as named on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModeName {
    #[default]
    Loop,
    Block,
}

/// Unvalidated user settings, defaults matching the command line
#[derive(Debug, Clone, PartialEq)]
pub struct RawConfig {
    pub infile: Option<PathBuf>,
    pub outfile: Option<PathBuf>,
    pub grain_size_ms: u32,
    pub grain_spacing_ms: u32,
    pub num_streams: usize,
    pub num_groups: usize,
    pub num_features: usize,
    pub disable_zero_crossings: bool,
    pub mode: ModeName,
    pub num_loops: usize,
    /// Seconds each group lasts in loop mode
    pub group_length: f32,
    pub blocks: Vec<String>,
    pub emptiness: f32,
    pub effects: Vec<String>,
    pub comp_thresh: f32,
    pub comp_ratio: f32,
    pub norm_level: f32,
    pub fade_size: f32,
    pub debug: u8,
    pub threads: usize,
}

impl Default for RawConfig {
    fn default() -> Self {
        Self {
            infile: None,
            outfile: None,
            grain_size_ms: 20,
            grain_spacing_ms: 200,
            num_streams: 100,
            num_groups: 5,
            num_features: 8,
            disable_zero_crossings: false,
            mode: ModeName::Loop,
            num_loops: 3,
            group_length: 2.0,
            blocks: Vec::new(),
            emptiness: 0.2,
            effects: Vec::new(),
            comp_thresh: 0.2,
            comp_ratio: 2.5,
            norm_level: 0.9,
            fade_size: 0.05,
            debug: 0,
            threads: 1,
        }
    }
}

/// Validated run configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub infile: PathBuf,
    pub outfile: PathBuf,
    pub grain_size_ms: u32,
    pub grain_spacing_ms: u32,
    pub num_streams: usize,
    pub num_groups: usize,
    pub num_features: usize,
    pub zero_crossings: bool,
    /// Block boundaries are already in grain slots
    pub mode: GeneratorMode,
    pub effects: Vec<EffectSpec>,
    pub mastering: MasteringParams,
    pub debug: u8,
    pub threads: usize,
}

fn out_of_range(name: &'static str, expected: &'static str, value: impl ToString) -> ConfigError {
    ConfigError::OutOfRange {
        name,
        expected,
        value: value.to_string(),
    }
}

fn check(
    ok: bool,
    name: &'static str,
    expected: &'static str,
    value: impl ToString,
) -> Result<(), ConfigError> {
    if ok {
        Ok(())
    } else {
        Err(out_of_range(name, expected, value))
    }
}

fn parse_number(token: &str, what: &'static str) -> Result<f32, ConfigError> {
    token
        .parse::<f32>()
        .map_err(|_| ConfigError::InvalidNumber(token.to_string(), what))
}

/// Times are kept in `f64` so `0.7` s is exactly 700 ms after scaling
fn parse_seconds(token: &str, what: &'static str) -> Result<f64, ConfigError> {
    token
        .parse::<f64>()
        .map_err(|_| ConfigError::InvalidNumber(token.to_string(), what))
}

impl Config {
    /// Validate `raw`. Random filter defaults are drawn from `rng`.
    pub fn from_raw<R: Rng + ?Sized>(raw: RawConfig, rng: &mut R) -> Result<Self, ConfigError> {
        let infile = raw.infile.ok_or(ConfigError::MissingInput)?;
        let outfile = raw.outfile.ok_or(ConfigError::MissingOutput)?;

        check(raw.grain_size_ms >= 1, "grain size", "at least 1 ms", raw.grain_size_ms)?;
        check(raw.grain_spacing_ms >= 1, "grain spacing", "at least 1 ms", raw.grain_spacing_ms)?;
        check(raw.num_streams >= 1, "number of grain streams", "at least 1", raw.num_streams)?;
        check(raw.num_groups >= 1, "number of cluster groups", "at least 1", raw.num_groups)?;
        check(raw.num_features >= 1, "number of features", "at least 1", raw.num_features)?;
        check(
            (0.0..=1.0).contains(&raw.comp_thresh),
            "compression threshold",
            "between 0 and 1",
            raw.comp_thresh,
        )?;
        check(raw.comp_ratio > 0.0, "compression ratio", "more than 0", raw.comp_ratio)?;
        check(
            raw.norm_level > 0.0 && raw.norm_level < 1.0,
            "normalisation level",
            "more than 0 and less than 1",
            raw.norm_level,
        )?;
        check(
            (0.0..=1.0).contains(&raw.fade_size),
            "fade size",
            "between 0 and 1",
            raw.fade_size,
        )?;
        check(raw.emptiness >= 0.0, "emptiness", "at least 0", raw.emptiness)?;
        check(raw.debug <= 2, "debug level", "0, 1 or 2", raw.debug)?;
        check(raw.threads >= 1, "thread count", "at least 1", raw.threads)?;

        let mut num_groups = raw.num_groups;
        let mode = match raw.mode {
            ModeName::Loop => {
                check(raw.num_loops >= 1, "number of loops", "at least 1", raw.num_loops)?;
                GeneratorMode::Loop {
                    repeats: raw.num_loops,
                    grains_per_group: loop_grains(raw.group_length, raw.grain_size_ms)?,
                }
            }
            ModeName::Block => {
                let blocks = parse_blocks(&raw.blocks, raw.grain_size_ms)?;
                let identifiers = distinct_identifiers(blocks.iter().map(|b| b.identifier.as_str()));
                if identifiers > num_groups {
                    tracing::warn!(
                        "{} unique identifiers entered in block list. Number of clustering groups increased from {} to {} to accommodate",
                        identifiers,
                        num_groups,
                        identifiers
                    );
                    num_groups = identifiers;
                }
                GeneratorMode::Block {
                    blocks,
                    emptiness: raw.emptiness,
                }
            }
        };

        let effects = parse_effects(&raw.effects, rng)?;
        let mut num_features = raw.num_features;
        let identifiers = distinct_identifiers(effects.iter().map(|e| e.identifier.as_str()));
        if identifiers > num_features {
            tracing::warn!(
                "{} unique identifiers entered in effects list. Number of clustering features increased from {} to {} to accommodate",
                identifiers,
                num_features,
                identifiers
            );
            num_features = identifiers;
        }

        Ok(Self {
            infile,
            outfile,
            grain_size_ms: raw.grain_size_ms,
            grain_spacing_ms: raw.grain_spacing_ms,
            num_streams: raw.num_streams,
            num_groups,
            num_features,
            zero_crossings: !raw.disable_zero_crossings,
            mode,
            effects,
            mastering: MasteringParams {
                comp_thresh: raw.comp_thresh,
                comp_ratio: raw.comp_ratio,
                norm_level: raw.norm_level,
                fade_size: raw.fade_size,
            },
            debug: raw.debug,
            threads: raw.threads,
        })
    }

    /// Convert to sample-based parameters for a source at `sample_rate`
    pub fn resolve(&self, sample_rate: u32) -> Result<SynthParams, ConfigError> {
        let grain_size = ms_to_samples(self.grain_size_ms, sample_rate);
        if grain_size == 0 {
            return Err(ConfigError::GrainTooShort {
                ms: self.grain_size_ms,
                sample_rate,
            });
        }

        let nyquist = sample_rate as f32 / 2.0;
        for effect in &self.effects {
            if let EffectKind::Filter(params) = effect.kind {
                if params.cutoff >= nyquist {
                    return Err(ConfigError::CutoffAboveNyquist {
                        identifier: effect.identifier.clone(),
                        cutoff: params.cutoff,
                        nyquist,
                    });
                }
            }
        }

        Ok(SynthParams {
            grain_size,
            grain_spacing: ms_to_samples(self.grain_spacing_ms, sample_rate),
            num_streams: self.num_streams,
            num_groups: self.num_groups,
            num_features: self.num_features,
            zero_crossings: self.zero_crossings,
            mode: self.mode.clone(),
            effects: self.effects.clone(),
            mastering: self.mastering,
            threads: self.threads,
        })
    }
}

/// `sample_rate * ms / 1000`, rounded down
pub fn ms_to_samples(ms: u32, sample_rate: u32) -> usize {
    (sample_rate as u64 * ms as u64 / 1000) as usize
}

/// Grains per group in loop mode.
///
/// The group length is cut down to a whole number of grains first.
pub fn loop_grains(group_length_secs: f32, grain_ms: u32) -> Result<usize, ConfigError> {
    let grain = grain_ms as f32;
    let length = group_length_secs * 1000.0;
    let length = length - length.rem_euclid(grain);
    if length.is_nan() || length < grain {
        return Err(ConfigError::LoopTooShort(grain / 1000.0));
    }
    Ok((length / grain) as usize)
}

/// Parse `identifier start end alpha` groups; times in seconds become slots
pub fn parse_blocks(tokens: &[String], grain_ms: u32) -> Result<Vec<Block>, ConfigError> {
    if tokens.is_empty() || tokens.len() % 4 != 0 {
        return Err(ConfigError::InvalidBlockList(tokens.len()));
    }

    let grain = grain_ms as f64;
    let to_slot = |token: &str, what: &'static str| -> Result<i64, ConfigError> {
        let ms = parse_seconds(token, what)? * 1000.0;
        Ok((ms / grain).floor() as i64)
    };

    tokens
        .chunks(4)
        .map(|chunk| {
            let identifier = chunk[0].clone();
            let start = to_slot(&chunk[1], "start time")?;
            let end = to_slot(&chunk[2], "end time")?;
            let alpha = parse_number(&chunk[3], "windowing parameter")?;

            check(start >= 0, "block start time", "at least 0", &chunk[1])?;
            if end <= start {
                return Err(ConfigError::EmptyBlock { identifier });
            }
            check(
                (0.0..=1.0).contains(&alpha),
                "windowing parameter",
                "between 0 and 1",
                alpha,
            )?;

            Ok(Block {
                identifier,
                start: start as usize,
                end: end as usize,
                alpha,
            })
        })
        .collect()
}

/// Effect type named by a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EffectType {
    Filter(FilterMode),
    Convolve,
}

impl EffectType {
    fn from_token(token: &str) -> Option<Self> {
        match token {
            "lp" | "lowpass" => Some(EffectType::Filter(FilterMode::LowPass)),
            "hp" | "highpass" => Some(EffectType::Filter(FilterMode::HighPass)),
            "cv" | "convolve" => Some(EffectType::Convolve),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            EffectType::Filter(mode) => mode.name(),
            EffectType::Convolve => "convolve",
        }
    }
}

/// An effect while its tokens are being read
struct PendingEffect {
    effect_type: EffectType,
    identifier: Option<String>,
    strength: Option<f32>,
    /// Cutoff, transition width and attenuation, in that order
    filter_values: Vec<f32>,
}

impl PendingEffect {
    fn new(effect_type: EffectType) -> Self {
        Self {
            effect_type,
            identifier: None,
            strength: None,
            filter_values: Vec::new(),
        }
    }

    fn push(&mut self, token: &str) -> Result<(), ConfigError> {
        if self.identifier.is_none() {
            self.identifier = Some(token.to_string());
            return Ok(());
        }
        if self.strength.is_none() {
            let strength = parse_number(token, "effect strength")?;
            check(
                strength > 0.0 && strength <= 1.0,
                "effect strength",
                "more than 0 and at most 1",
                strength,
            )?;
            self.strength = Some(strength);
            return Ok(());
        }

        let (name, min, max) = match (self.effect_type, self.filter_values.len()) {
            (EffectType::Filter(_), 0) => ("cutoff", 1.0, MAX_FILTER_HZ),
            (EffectType::Filter(_), 1) => ("transition band width", 1.0, MAX_FILTER_HZ),
            (EffectType::Filter(_), 2) => ("attenuation", MIN_ATTENUATION_DB, MAX_ATTENUATION_DB),
            _ => {
                tracing::warn!(
                    "Too many parameters provided for {}, parameter {} ignored",
                    self.effect_type.name(),
                    token
                );
                return Ok(());
            }
        };

        let value = parse_number(token, name)?;
        let expected = match name {
            "attenuation" => "between 8 and 200 dB",
            _ => "between 1 and 20000 Hz",
        };
        check((min..=max).contains(&value), name, expected, value)?;
        self.filter_values.push(value);
        Ok(())
    }

    fn finish<R: Rng + ?Sized>(self, rng: &mut R) -> Result<EffectSpec, ConfigError> {
        let name = self.effect_type.name().to_string();
        let identifier = self
            .identifier
            .ok_or_else(|| ConfigError::MissingIdentifier(name.clone()))?;
        let strength = self.strength.ok_or(ConfigError::MissingStrength(name))?;

        let kind = match self.effect_type {
            EffectType::Convolve => EffectKind::Convolve,
            EffectType::Filter(mode) => {
                let mut values = self.filter_values.into_iter();
                let cutoff = values
                    .next()
                    .unwrap_or_else(|| rng.gen::<f32>() * 10000.0 + 2000.0);
                let transition_width = values
                    .next()
                    .unwrap_or_else(|| rng.gen::<f32>() * 800.0 + 200.0);
                let attenuation_db = values.next().unwrap_or(DEFAULT_ATTENUATION_DB);
                EffectKind::Filter(FilterParams {
                    mode,
                    cutoff,
                    transition_width,
                    attenuation_db,
                })
            }
        };

        Ok(EffectSpec {
            kind,
            identifier,
            strength,
        })
    }
}

/// Parse an effect token list.
///
/// A type token (`lp`, `lowpass`, `hp`, `highpass`, `cv`, `convolve`) starts
/// a new effect, followed by its identifier, its strength and, for filters,
/// optional cutoff, transition width and attenuation. Missing filter values
/// get random cutoff and transition width and a 60 dB attenuation.
pub fn parse_effects<R: Rng + ?Sized>(
    tokens: &[String],
    rng: &mut R,
) -> Result<Vec<EffectSpec>, ConfigError> {
    let mut pending: Vec<PendingEffect> = Vec::new();
    for token in tokens {
        if let Some(effect_type) = EffectType::from_token(token) {
            pending.push(PendingEffect::new(effect_type));
            continue;
        }
        match pending.last_mut() {
            Some(effect) => effect.push(token)?,
            None => return Err(ConfigError::InvalidEffectType(token.clone())),
        }
    }

    pending.into_iter().map(|p| p.finish(rng)).collect()
}

fn distinct_identifiers<'a>(identifiers: impl Iterator<Item = &'a str>) -> usize {
    let mut seen: Vec<&str> = Vec::new();
    for id in identifiers {
        if !seen.contains(&id) {
            seen.push(id);
        }
    }
    seen.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn tokens(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    fn raw() -> RawConfig {
        RawConfig {
            infile: Some(PathBuf::from("in.wav")),
            outfile: Some(PathBuf::from("out.wav")),
            ..Default::default()
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(11)
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_raw(raw(), &mut rng()).unwrap();
        assert_eq!(config.grain_size_ms, 20);
        assert_eq!(config.num_streams, 100);
        assert!(config.zero_crossings);
        assert!(config.effects.is_empty());
        assert_eq!(config.mastering, MasteringParams::default());
        // 2000 ms of 20 ms grains
        assert_eq!(
            config.mode,
            GeneratorMode::Loop {
                repeats: 3,
                grains_per_group: 100
            }
        );
    }

    #[test]
    fn test_missing_files() {
        let mut r = raw();
        r.infile = None;
        assert_eq!(Config::from_raw(r, &mut rng()), Err(ConfigError::MissingInput));

        let mut r = raw();
        r.outfile = None;
        assert_eq!(Config::from_raw(r, &mut rng()), Err(ConfigError::MissingOutput));
    }

    #[test]
    fn test_range_checks() {
        let cases: Vec<fn(&mut RawConfig)> = vec![
            |r: &mut RawConfig| r.grain_size_ms = 0,
            |r: &mut RawConfig| r.num_streams = 0,
            |r: &mut RawConfig| r.comp_thresh = 1.5,
            |r: &mut RawConfig| r.comp_ratio = 0.0,
            |r: &mut RawConfig| r.norm_level = 1.0,
            |r: &mut RawConfig| r.fade_size = -0.1,
            |r: &mut RawConfig| r.emptiness = -1.0,
            |r: &mut RawConfig| r.num_loops = 0,
        ];
        for case in cases {
            let mut r = raw();
            case(&mut r);
            assert!(matches!(
                Config::from_raw(r, &mut rng()),
                Err(ConfigError::OutOfRange { .. })
            ));
        }
    }

    #[test]
    fn test_loop_grains() {
        assert_eq!(loop_grains(2.0, 20), Ok(100));
        // 1000 - (1000 % 30) = 990 ms
        assert_eq!(loop_grains(1.0, 30), Ok(33));
        assert_eq!(loop_grains(0.01, 20), Err(ConfigError::LoopTooShort(0.02)));
    }

    #[test]
    fn test_parse_blocks() {
        let blocks = parse_blocks(&tokens("a 0 1.5 0.5 b 1 2.01 0"), 20).unwrap();
        assert_eq!(
            blocks,
            vec![
                Block {
                    identifier: "a".to_string(),
                    start: 0,
                    end: 75,
                    alpha: 0.5
                },
                Block {
                    identifier: "b".to_string(),
                    start: 50,
                    end: 100,
                    alpha: 0.0
                },
            ]
        );
    }

    #[test]
    fn test_parse_blocks_decimal_seconds() {
        let blocks = parse_blocks(&tokens("a 0 0.7 0 b 0.7 1.4 0"), 20).unwrap();
        assert_eq!((blocks[0].start, blocks[0].end), (0, 35));
        assert_eq!((blocks[1].start, blocks[1].end), (35, 70));
    }

    #[test]
    fn test_parse_blocks_errors() {
        assert_eq!(
            parse_blocks(&tokens("a 0 1"), 20),
            Err(ConfigError::InvalidBlockList(3))
        );
        assert_eq!(parse_blocks(&[], 20), Err(ConfigError::InvalidBlockList(0)));
        assert_eq!(
            parse_blocks(&tokens("a 1 1.01 0"), 20),
            Err(ConfigError::EmptyBlock {
                identifier: "a".to_string()
            })
        );
        assert!(matches!(
            parse_blocks(&tokens("a -1 1 0"), 20),
            Err(ConfigError::OutOfRange { .. })
        ));
        assert!(matches!(
            parse_blocks(&tokens("a 0 1 1.5"), 20),
            Err(ConfigError::OutOfRange { .. })
        ));
        assert!(matches!(
            parse_blocks(&tokens("a zero 1 0"), 20),
            Err(ConfigError::InvalidNumber(..))
        ));
    }

    #[test]
    fn test_block_identifiers_raise_groups() {
        let mut r = raw();
        r.mode = ModeName::Block;
        r.num_groups = 2;
        r.blocks = tokens("a 0 1 0 b 0 1 0 c 0 1 0 a 1 2 0");
        let config = Config::from_raw(r, &mut rng()).unwrap();
        assert_eq!(config.num_groups, 3);
        assert!(matches!(config.mode, GeneratorMode::Block { emptiness, .. } if emptiness == 0.2));
    }

    #[test]
    fn test_parse_effects_full() {
        let effects = parse_effects(&tokens("hp x 0.5 3000 400 80 cv y 1"), &mut rng()).unwrap();
        assert_eq!(
            effects,
            vec![
                EffectSpec {
                    kind: EffectKind::Filter(FilterParams {
                        mode: FilterMode::HighPass,
                        cutoff: 3000.0,
                        transition_width: 400.0,
                        attenuation_db: 80.0,
                    }),
                    identifier: "x".to_string(),
                    strength: 0.5,
                },
                EffectSpec {
                    kind: EffectKind::Convolve,
                    identifier: "y".to_string(),
                    strength: 1.0,
                },
            ]
        );
    }

    #[test]
    fn test_parse_effects_random_defaults() {
        let effects = parse_effects(&tokens("lowpass a 0.3"), &mut rng()).unwrap();
        match effects[0].kind {
            EffectKind::Filter(params) => {
                assert_eq!(params.mode, FilterMode::LowPass);
                assert!((2000.0..12000.0).contains(&params.cutoff));
                assert!((200.0..1000.0).contains(&params.transition_width));
                assert_eq!(params.attenuation_db, 60.0);
            }
            EffectKind::Convolve => panic!("expected a filter"),
        }
    }

    #[test]
    fn test_parse_effects_surplus_ignored() {
        let effects = parse_effects(&tokens("cv a 0.5 9 9 lp b 1 500 100 60 7"), &mut rng()).unwrap();
        assert_eq!(effects.len(), 2);
        assert_eq!(effects[0].kind, EffectKind::Convolve);
    }

    #[test]
    fn test_parse_effects_errors() {
        assert_eq!(
            parse_effects(&tokens("a 0.5"), &mut rng()),
            Err(ConfigError::InvalidEffectType("a".to_string()))
        );
        assert_eq!(
            parse_effects(&tokens("cv"), &mut rng()),
            Err(ConfigError::MissingIdentifier("convolve".to_string()))
        );
        assert_eq!(
            parse_effects(&tokens("lp a"), &mut rng()),
            Err(ConfigError::MissingStrength("lowpass".to_string()))
        );
        assert!(matches!(
            parse_effects(&tokens("cv a 1.5"), &mut rng()),
            Err(ConfigError::OutOfRange { .. })
        ));
        assert!(matches!(
            parse_effects(&tokens("lp a 0.5 25000"), &mut rng()),
            Err(ConfigError::OutOfRange { .. })
        ));
        assert!(matches!(
            parse_effects(&tokens("hp a 0.5 1000 100 4"), &mut rng()),
            Err(ConfigError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_effect_identifiers_raise_features() {
        let mut r = raw();
        r.num_features = 1;
        r.effects = tokens("cv a 0.5 cv b 0.5 lp a 0.2");
        let config = Config::from_raw(r, &mut rng()).unwrap();
        assert_eq!(config.num_features, 2);
        assert_eq!(config.effects.len(), 3);
    }

    #[test]
    fn test_resolve() {
        let config = Config::from_raw(raw(), &mut rng()).unwrap();
        let params = config.resolve(44100).unwrap();
        assert_eq!(params.grain_size, 882);
        assert_eq!(params.grain_spacing, 8820);
        assert_eq!(params.grouping().num_groups, 5);

        // 22050 * 20 / 1000
        assert_eq!(config.resolve(22050).unwrap().grain_size, 441);
    }

    #[test]
    fn test_resolve_cutoff_above_nyquist() {
        let mut r = raw();
        r.effects = tokens("cv a 0.5 lp b 0.5 15000 500");
        let config = Config::from_raw(r, &mut rng()).unwrap();
        assert!(config.resolve(44100).is_ok());
        assert_eq!(
            config.resolve(22050),
            Err(ConfigError::CutoffAboveNyquist {
                identifier: "b".to_string(),
                cutoff: 15000.0,
                nyquist: 11025.0,
            })
        );

        // Exactly at Nyquist is rejected too
        let mut r = raw();
        r.effects = tokens("hp c 1 11025");
        let config = Config::from_raw(r, &mut rng()).unwrap();
        assert!(matches!(
            config.resolve(22050),
            Err(ConfigError::CutoffAboveNyquist { .. })
        ));
    }

    #[test]
    fn test_resolve_grain_too_short() {
        let mut r = raw();
        r.grain_size_ms = 1;
        let config = Config::from_raw(r, &mut rng()).unwrap();
        assert_eq!(
            config.resolve(500),
            Err(ConfigError::GrainTooShort {
                ms: 1,
                sample_rate: 500
            })
        );
    }
}
