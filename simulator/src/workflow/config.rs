use crate::generator::engine::SyntheticConfig;
use anyhow::{bail, Context};
use radarsimcore::capture::CaptureSettings;
use radarsimcore::distributed::effective_seed;
use radarsimcore::scan::{ScanState, SweepSpec};
use radarsimcore::telemetry::LogManager;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Sessions longer than this get a default warm-up.
pub const LONG_SESSION_PULSES: usize = 1000;
pub const DEFAULT_WARM_UP_PULSES: usize = 2000;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// `M:S:E:D` sweep string.
    pub sweep: String,
    pub azimuth: f32,
    pub elevation: f32,
    pub pulses: Option<usize>,
    pub warm_up: Option<usize>,
    pub prt: Option<f32>,
    pub output_iq: bool,
    pub save_state: bool,
    pub output_dir: Option<String>,
    pub show_progress: bool,
    pub nodes: usize,
    /// Ring the terminal bell once the session completes.
    pub alarm: bool,
    pub engine: SyntheticConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        let sweep = SweepSpec::default();
        Self {
            sweep: sweep.to_string(),
            azimuth: sweep.start,
            elevation: 3.0,
            pulses: None,
            warm_up: None,
            prt: None,
            output_iq: false,
            save_state: false,
            output_dir: None,
            show_progress: true,
            nodes: 1,
            alarm: false,
            engine: SyntheticConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref)
            .with_context(|| format!("reading session config {}", path_ref.display()))?;
        let config: SessionConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("parsing session config {}", path_ref.display()))?;
        Ok(config)
    }

    pub fn sweep_spec(&self) -> anyhow::Result<SweepSpec> {
        self.sweep
            .parse::<SweepSpec>()
            .with_context(|| format!("in sweep argument '{}'", self.sweep))
    }

    pub fn scan_state(&self) -> anyhow::Result<ScanState> {
        Ok(ScanState::new(self.sweep_spec()?, self.azimuth, self.elevation))
    }

    pub fn num_pulses(&self) -> anyhow::Result<usize> {
        match self.pulses {
            Some(count) if count > 0 => Ok(count),
            _ => bail!("No pulses to be generated."),
        }
    }

    /// Explicit warm-up, else 2000 pulses for long sessions and none otherwise.
    pub fn warm_up_pulses(&self) -> usize {
        match self.warm_up {
            Some(count) => count,
            None if self.pulses.unwrap_or(0) > LONG_SESSION_PULSES => DEFAULT_WARM_UP_PULSES,
            None => 0,
        }
    }

    pub fn writes_files(&self) -> bool {
        self.output_iq || self.save_state
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.num_pulses()?;
        self.sweep_spec()?;
        if self.nodes == 0 {
            bail!("a session needs at least one node");
        }
        if let Some(prt) = self.prt {
            if !(prt > 0.0) {
                bail!("pulse repetition time {} must be positive", prt);
            }
        }
        Ok(())
    }

    pub fn capture_settings(&self, rank: usize) -> anyhow::Result<CaptureSettings> {
        let mut settings = CaptureSettings::new(self.num_pulses()?)
            .with_warm_up(self.warm_up_pulses())
            .with_record_iq(self.output_iq)
            .with_logger(LogManager::for_rank(rank));
        if let Some(prt) = self.prt {
            settings = settings.with_prt(prt);
        }
        Ok(settings)
    }

    /// Engine knobs for one node; a supplied seed is offset by the rank.
    pub fn engine_config(&self, rank: usize) -> SyntheticConfig {
        SyntheticConfig {
            seed: self.engine.seed.map(|seed| effective_seed(seed, rank)),
            ..self.engine.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radarsimcore::scan::ScanMode;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn defaults_match_the_classic_ppi_session() {
        let cfg = SessionConfig::default();
        let scan = cfg.scan_state().unwrap();
        assert_eq!(scan.mode, ScanMode::Ppi);
        assert_eq!(scan.azimuth, -12.0);
        assert_eq!(scan.elevation, 3.0);
        assert!(!cfg.writes_files());
    }

    #[test]
    fn missing_or_zero_pulses_are_rejected() {
        let mut cfg = SessionConfig::default();
        assert!(cfg.validate().is_err());
        cfg.pulses = Some(0);
        assert!(cfg.validate().is_err());
        cfg.pulses = Some(10);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn warm_up_defaults_depend_on_session_length() {
        let mut cfg = SessionConfig {
            pulses: Some(2400),
            ..Default::default()
        };
        assert_eq!(cfg.warm_up_pulses(), DEFAULT_WARM_UP_PULSES);
        cfg.pulses = Some(1000);
        assert_eq!(cfg.warm_up_pulses(), 0);
        cfg.warm_up = Some(5);
        assert_eq!(cfg.warm_up_pulses(), 5);
    }

    #[test]
    fn seeds_are_offset_only_when_supplied() {
        let mut cfg = SessionConfig::default();
        assert_eq!(cfg.engine_config(3).seed, None);
        cfg.engine.seed = Some(100);
        assert_eq!(cfg.engine_config(0).seed, Some(100));
        assert_eq!(cfg.engine_config(2).seed, Some(102));
    }

    #[test]
    fn bad_sweep_is_reported() {
        let cfg = SessionConfig {
            sweep: "P:-12:12".into(),
            pulses: Some(1),
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn config_load_reads_yaml() {
        let mut temp = NamedTempFile::new().unwrap();
        temp.write_all(
            b"sweep: \"R:0.5:12.0:0.02\"\npulses: 300\noutput_iq: true\n\
              engine:\n  seed: 7\n  debris: [100, 20]\n",
        )
        .unwrap();
        let path = temp.into_temp_path();
        let cfg = SessionConfig::load(&path).unwrap();
        assert_eq!(cfg.pulses, Some(300));
        assert_eq!(cfg.engine.debris, vec![100, 20]);
        assert_eq!(cfg.nodes, 1);
        let scan = cfg.scan_state().unwrap();
        assert_eq!(scan.mode, ScanMode::Rhi);
        assert_eq!(scan.elevation, 0.5);
        let settings = cfg.capture_settings(0).unwrap();
        assert!(settings.record_iq);
        assert_eq!(settings.warm_up_pulses, 0);
    }
}
