// PassStore - file-backed named tables, one JSON file per pass
//
// Directory layout:
//   mean_rms.json            optional initial baselines (and calibration)
//   selection_pass_0000.json output of pass 0
//   selection_pass_0001.json output of pass 1, read by pass 2 ...
//
// Histogram and table names are generated here and nowhere else; they keep
// the names downstream plotting expects.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::analysis::EventCounters;
use crate::calibration::{BadChannelSet, BaselineStatistics, CalibrationMap};
use crate::config::AppConfig;
use crate::context::PassInputs;
use crate::diagnostics::{DiagnosticHistograms, SnapshotStage};
use crate::error::{CalibrationError, StoreError};
use crate::geometry::{Channel, ChannelGrid, MODULES, SECTORS};
use crate::histogram::{Histogram1D, Histogram2D};
use crate::merge::{PassReport, PassSummary};

pub const INITIAL_TABLES_FILE: &str = "mean_rms.json";
const PASS_FILE_PREFIX: &str = "selection_pass_";
const PASS_FILE_SUFFIX: &str = ".json";

const SECTOR_MEAN: &str = "hist_sec_Mean";
const SECTOR_RMS: &str = "hist_sec_RMS";
const CHANNEL_MEAN: &str = "hist_ch_Mean";
const CHANNEL_RMS: &str = "hist_ch_RMS";
const CALIBRATION: &str = "2DMuonSignalMap";
const EVENT_COUNT: &str = "EventCount";

/// Tables of one pass as persisted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PassTables {
    pub pass: u32,
    #[serde(rename = "EventCount")]
    pub event_count: Vec<u64>,
    #[serde(rename = "hist_sec_Mean")]
    pub sector_mean: Vec<f64>,
    #[serde(rename = "hist_sec_RMS")]
    pub sector_rms: Vec<f64>,
    #[serde(rename = "hist_ch_Mean")]
    pub channel_mean: Vec<f64>,
    #[serde(rename = "hist_ch_RMS")]
    pub channel_rms: Vec<f64>,
    /// Calibration factors, module x sector
    #[serde(rename = "2DMuonSignalMap")]
    pub calibration: Vec<Vec<f64>>,
    #[serde(default)]
    pub histograms: BTreeMap<String, Histogram1D>,
    #[serde(default)]
    pub histograms_2d: BTreeMap<String, Histogram2D>,
    /// Per-channel counts, module x sector
    #[serde(default)]
    pub count_maps: BTreeMap<String, Vec<Vec<u64>>>,
    #[serde(default)]
    pub sector_counts: BTreeMap<String, Vec<u64>>,
    #[serde(default)]
    pub run_counts: BTreeMap<String, BTreeMap<u32, u64>>,
    #[serde(default)]
    pub summary: Option<PassSummary>,
}

/// Initial baselines, optionally with a starting calibration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitialTables {
    #[serde(rename = "hist_sec_Mean")]
    pub sector_mean: Vec<f64>,
    #[serde(rename = "hist_sec_RMS")]
    pub sector_rms: Vec<f64>,
    #[serde(rename = "hist_ch_Mean")]
    pub channel_mean: Vec<f64>,
    #[serde(rename = "hist_ch_RMS")]
    pub channel_rms: Vec<f64>,
    #[serde(rename = "2DMuonSignalMap", default, skip_serializing_if = "Option::is_none")]
    pub calibration: Option<Vec<Vec<f64>>>,
}

impl InitialTables {
    pub fn from_baseline(baseline: &BaselineStatistics, calibration: Option<&CalibrationMap>) -> Self {
        Self {
            sector_mean: baseline.sector_means(),
            sector_rms: baseline.sector_rms(),
            channel_mean: baseline.channel_means(),
            channel_rms: baseline.channel_rms(),
            calibration: calibration.map(|c| c.to_module_sector_table()),
        }
    }

    pub fn baseline(&self) -> Result<BaselineStatistics, CalibrationError> {
        BaselineStatistics::from_tables(
            &self.sector_mean,
            &self.sector_rms,
            &self.channel_mean,
            &self.channel_rms,
        )
    }

    pub fn calibration(&self) -> Result<CalibrationMap, CalibrationError> {
        match &self.calibration {
            Some(rows) => CalibrationMap::from_module_sector_table(rows),
            None => Ok(CalibrationMap::unit()),
        }
    }
}

pub fn muon_signal_name(channel: Channel) -> String {
    format!("MuonSignalSecCh_mod_{}_sec_{}", channel.module, channel.sector)
}

pub fn muon_signal_no_trigger_name(channel: Channel) -> String {
    format!(
        "MuonSignalSecCh_withoutrigger_mod_{}_sec_{}",
        channel.module, channel.sector
    )
}

pub fn neighbour_noise_name(channel: Channel) -> String {
    format!("CastorNoise_mod_{}_sec_{}", channel.module, channel.sector)
}

pub fn random_noise_name(channel: Channel) -> String {
    format!(
        "CastorNoise_randomtrg_mod_{}_sec_{}",
        channel.module, channel.sector
    )
}

fn snapshot_suffix(stage: SnapshotStage) -> &'static str {
    match stage {
        SnapshotStage::AllSectors => "",
        SnapshotStage::LooseHotSector => "For3SigmaSectors",
        SnapshotStage::MuonCandidate => "ForMuonCandidateSector",
    }
}

fn multiplicity_prefix(stage: SnapshotStage) -> &'static str {
    match stage {
        SnapshotStage::AllSectors => "2DcountChannelsAboveNoiseForAllSectors",
        SnapshotStage::LooseHotSector => "2DcountChannelsAboveNoiseFor3SigmaSectors",
        SnapshotStage::MuonCandidate => "2DcountChannelsAboveNoiseForMuonCandidateSector",
    }
}

/// Module x sector table of per-channel counts
fn count_table(grid: &ChannelGrid<u64>) -> Vec<Vec<u64>> {
    (0..MODULES)
        .map(|module| {
            (0..SECTORS)
                .map(|sector| grid[Channel { sector, module }])
                .collect()
        })
        .collect()
}

fn insert_channel_histograms(
    out: &mut BTreeMap<String, Histogram1D>,
    grid: &ChannelGrid<Histogram1D>,
    name: fn(Channel) -> String,
) {
    for (channel, histogram) in grid.iter() {
        out.insert(name(channel), histogram.clone());
    }
}

impl PassTables {
    pub fn from_report(pass: u32, report: &PassReport) -> Self {
        let diagnostics: &DiagnosticHistograms = &report.diagnostics;

        let mut histograms = BTreeMap::new();
        insert_channel_histograms(&mut histograms, &diagnostics.muon_signal, muon_signal_name);
        insert_channel_histograms(
            &mut histograms,
            &diagnostics.muon_signal_no_trigger,
            muon_signal_no_trigger_name,
        );
        insert_channel_histograms(
            &mut histograms,
            &diagnostics.neighbour_noise,
            neighbour_noise_name,
        );
        insert_channel_histograms(&mut histograms, &diagnostics.random_noise, random_noise_name);

        let mut histograms_2d = BTreeMap::new();
        histograms_2d.insert(
            "2DcountSectorRMS_AllEvt".to_string(),
            diagnostics.sector_significance_all.clone(),
        );
        histograms_2d.insert(
            "2DcountSectorRMS_RndEvt".to_string(),
            diagnostics.sector_significance_random.clone(),
        );
        histograms_2d.insert(
            "2DSecRMSHot_Vs_SecRMSSecondHot_AllEvt".to_string(),
            diagnostics.hottest_vs_second_all.clone(),
        );
        histograms_2d.insert(
            "2DSecRMSHot_Vs_SecRMSSecondHot_RndEvt".to_string(),
            diagnostics.hottest_vs_second_random.clone(),
        );

        let mut count_maps = BTreeMap::new();
        for stage in SnapshotStage::ALL {
            let snapshot = diagnostics.snapshot(stage);
            let suffix = snapshot_suffix(stage);
            count_maps.insert(
                format!("2DcountChannelAboveTwoSigma{}_AllEvt", suffix),
                count_table(&snapshot.channels_all),
            );
            count_maps.insert(
                format!("2DcountChannelAboveTwoSigma{}_RndEvt", suffix),
                count_table(&snapshot.channels_random),
            );
            let prefix = multiplicity_prefix(stage);
            histograms_2d.insert(format!("{}_AllEvt", prefix), snapshot.multiplicity_all.clone());
            histograms_2d.insert(
                format!("{}_RndEvt", prefix),
                snapshot.multiplicity_random.clone(),
            );
        }
        count_maps.insert(
            "2DMuonCountMap".to_string(),
            count_table(&diagnostics.muon_count_map),
        );
        count_maps.insert(
            "2DMuonCountMap_allch".to_string(),
            count_table(&diagnostics.above_noise_all_channels),
        );

        let mut sector_counts = BTreeMap::new();
        sector_counts.insert(
            "GoodMuonCountPerSec".to_string(),
            diagnostics.good_muons_per_sector.to_vec(),
        );

        let mut run_counts = BTreeMap::new();
        run_counts.insert(
            "RunsWithGoodMuons".to_string(),
            diagnostics.runs_with_good_muons.clone(),
        );
        run_counts.insert(
            "RunsAllTrigger".to_string(),
            diagnostics.runs_all_trigger.clone(),
        );

        Self {
            pass,
            event_count: report.counters.slots().to_vec(),
            sector_mean: report.baseline.sector_means(),
            sector_rms: report.baseline.sector_rms(),
            channel_mean: report.baseline.channel_means(),
            channel_rms: report.baseline.channel_rms(),
            calibration: report.calibration.map.to_module_sector_table(),
            histograms,
            histograms_2d,
            count_maps,
            sector_counts,
            run_counts,
            summary: Some(report.summary()),
        }
    }

    pub fn baseline(&self) -> Result<BaselineStatistics, CalibrationError> {
        BaselineStatistics::from_tables(
            &self.sector_mean,
            &self.sector_rms,
            &self.channel_mean,
            &self.channel_rms,
        )
    }

    pub fn calibration(&self) -> Result<CalibrationMap, CalibrationError> {
        CalibrationMap::from_module_sector_table(&self.calibration)
    }

    pub fn counters(&self) -> Result<EventCounters, CalibrationError> {
        EventCounters::from_slots(&self.event_count).ok_or_else(|| CalibrationError::TableShape {
            table: EVENT_COUNT.to_string(),
            expected: 8,
            found: self.event_count.len(),
        })
    }
}

/// Directory of pass outputs
#[derive(Debug, Clone)]
pub struct PassStore {
    root: PathBuf,
}

impl PassStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn pass_path(&self, pass: u32) -> PathBuf {
        self.root
            .join(format!("{}{:04}{}", PASS_FILE_PREFIX, pass, PASS_FILE_SUFFIX))
    }

    pub fn initial_tables_path(&self) -> PathBuf {
        self.root.join(INITIAL_TABLES_FILE)
    }

    /// Pass numbers present on disk, ascending
    pub fn existing_passes(&self) -> Result<Vec<u32>, StoreError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.root).map_err(|e| io_error(&self.root, e))?;
        let mut passes = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_error(&self.root, e))?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let number = name
                .strip_prefix(PASS_FILE_PREFIX)
                .and_then(|rest| rest.strip_suffix(PASS_FILE_SUFFIX))
                .and_then(|digits| digits.parse::<u32>().ok());
            if let Some(number) = number {
                passes.push(number);
            }
        }
        passes.sort_unstable();
        Ok(passes)
    }

    pub fn latest_pass(&self) -> Result<Option<u32>, StoreError> {
        Ok(self.existing_passes()?.last().copied())
    }

    /// Number the next pass will be written under
    pub fn next_pass(&self) -> Result<u32, StoreError> {
        Ok(self.latest_pass()?.map_or(0, |latest| latest + 1))
    }

    /// Inputs for the next pass: previous pass output, else the initial
    /// tables, else neutral baselines with unit calibration
    pub fn load_inputs(
        &self,
        bad_channels: BadChannelSet,
        config: &AppConfig,
    ) -> Result<(u32, PassInputs), StoreError> {
        if let Some(latest) = self.latest_pass()? {
            let path = self.pass_path(latest);
            let tables = self.load_pass(latest)?;
            let baseline = tables.baseline().map_err(|e| invalid(&path, e))?;
            let calibration = tables.calibration().map_err(|e| invalid(&path, e))?;
            log::info!("Pass {} reads tables of pass {}", latest + 1, latest);
            return Ok((
                latest + 1,
                PassInputs::new(baseline, calibration, bad_channels, config),
            ));
        }

        let initial = self.initial_tables_path();
        if initial.exists() {
            let tables: InitialTables = read_tables(
                &initial,
                &[SECTOR_MEAN, SECTOR_RMS, CHANNEL_MEAN, CHANNEL_RMS],
            )?;
            let baseline = tables.baseline().map_err(|e| invalid(&initial, e))?;
            let calibration = tables.calibration().map_err(|e| invalid(&initial, e))?;
            log::info!("Pass 0 reads initial tables from {}", initial.display());
            return Ok((0, PassInputs::new(baseline, calibration, bad_channels, config)));
        }

        log::info!("Pass 0 starts from neutral baselines and unit calibration");
        Ok((0, PassInputs::first_pass(bad_channels, config)))
    }

    pub fn load_pass(&self, pass: u32) -> Result<PassTables, StoreError> {
        let path = self.pass_path(pass);
        if !path.exists() {
            return Err(StoreError::PassNotFound { pass });
        }
        read_tables(
            &path,
            &[
                EVENT_COUNT,
                SECTOR_MEAN,
                SECTOR_RMS,
                CHANNEL_MEAN,
                CHANNEL_RMS,
                CALIBRATION,
            ],
        )
    }

    pub fn write_pass(&self, pass: u32, report: &PassReport) -> Result<PathBuf, StoreError> {
        let path = self.pass_path(pass);
        write_json(&path, &PassTables::from_report(pass, report))?;
        log::info!("Wrote pass {} tables to {}", pass, path.display());
        Ok(path)
    }

    pub fn write_initial_tables(&self, tables: &InitialTables) -> Result<PathBuf, StoreError> {
        let path = self.initial_tables_path();
        write_json(&path, tables)?;
        Ok(path)
    }

    /// Delete every pass file; returns how many were removed
    pub fn clear(&self) -> Result<usize, StoreError> {
        let passes = self.existing_passes()?;
        for pass in &passes {
            let path = self.pass_path(*pass);
            fs::remove_file(&path).map_err(|e| io_error(&path, e))?;
        }
        if !passes.is_empty() {
            log::info!("Removed {} pass files from {}", passes.len(), self.root.display());
        }
        Ok(passes.len())
    }
}

fn io_error(path: &Path, err: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}

fn invalid(path: &Path, source: CalibrationError) -> StoreError {
    StoreError::InvalidTables {
        path: path.display().to_string(),
        source,
    }
}

/// Parse a table file after checking that every required table is present
fn read_tables<T: for<'de> Deserialize<'de>>(path: &Path, required: &[&str]) -> Result<T, StoreError> {
    let file = File::open(path).map_err(|e| io_error(path, e))?;
    let value: Value =
        serde_json::from_reader(BufReader::new(file)).map_err(|e| StoreError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
    if let Some(missing) = required.iter().find(|table| value.get(**table).is_none()) {
        return Err(StoreError::MissingTable {
            path: path.display().to_string(),
            table: missing.to_string(),
        });
    }
    serde_json::from_value(value).map_err(|e| StoreError::Parse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
    }
    let file = File::create(path).map_err(|e| io_error(path, e))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer(&mut writer, value).map_err(|e| StoreError::Parse {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;
    writer.flush().map_err(|e| io_error(path, e))
}
