//! Per-condition onset and duration files from behavioral task logs.
//!
//! Runs are concatenated: onsets in run `i` are shifted by `i * TR * volumes`
//! so they line up with the concatenated functional series.

use crate::error::{PrepError, Result};
use crate::pattern::FilenamePattern;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

pub const DEFAULT_COLUMNS: [&str; 11] = [
    "sub",
    "trialtype",
    "totaldur",
    "statenum",
    "trialtypnum",
    "resp1",
    "respf",
    "rt1",
    "rtf",
    "dk",
    "onset",
];

const TRIAL_TYPE_COLUMN: &str = "trialtype";
const RESPONSE_TIME_COLUMN: &str = "rtf";
const TRIAL_DURATION_COLUMN: &str = "totaldur";

/// Column layout of a tab-separated behavioral log.
#[derive(Debug, Clone)]
pub struct LogLayout {
    columns: Vec<String>,
    trial_type: usize,
    onset: usize,
    duration: Duration,
}

#[derive(Debug, Clone)]
enum Duration {
    /// Response time when the participant responded, otherwise the trial length
    ResponseOrTrial { response: usize, trial: usize },
    Column(usize),
}

impl Default for LogLayout {
    fn default() -> Self {
        let columns: Vec<String> = DEFAULT_COLUMNS.iter().map(|c| c.to_string()).collect();
        Self::new(columns, "onset", None).expect("default layout names its own columns")
    }
}

impl LogLayout {
    pub fn new(columns: Vec<String>, onset_column: &str, duration_column: Option<&str>) -> Result<Self> {
        let find = |name: &str| {
            columns.iter().position(|c| c == name).ok_or_else(|| {
                PrepError::InvalidArgument(format!(
                    "column '{}' is not in the log layout ({})",
                    name,
                    columns.join(",")
                ))
            })
        };
        let trial_type = find(TRIAL_TYPE_COLUMN)?;
        let onset = find(onset_column)?;
        let duration = match duration_column {
            Some(name) => Duration::Column(find(name)?),
            None => Duration::ResponseOrTrial {
                response: find(RESPONSE_TIME_COLUMN)?,
                trial: find(TRIAL_DURATION_COLUMN)?,
            },
        };
        Ok(Self {
            columns,
            trial_type,
            onset,
            duration,
        })
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    fn parse_row(&self, line: &str) -> std::result::Result<Trial, String> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() != self.width() {
            return Err(format!(
                "expected {} columns, found {}",
                self.width(),
                fields.len()
            ));
        }
        let number = |idx: usize| {
            fields[idx]
                .trim()
                .parse::<f64>()
                .map_err(|e| format!("column {}: {}", self.columns[idx], e))
        };
        let duration = match self.duration {
            Duration::Column(idx) => number(idx)?,
            Duration::ResponseOrTrial { response, trial } => {
                let rt = number(response)?;
                if rt != 0.0 {
                    rt
                } else {
                    number(trial)?
                }
            }
        };
        Ok(Trial {
            condition: fields[self.trial_type].trim().to_string(),
            onset: number(self.onset)?,
            duration,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Trial {
    condition: String,
    onset: f64,
    duration: f64,
}

#[derive(Debug, Clone)]
pub struct OnsetRequest {
    pub task: String,
    pub study_task: String,
    pub subject: String,
    pub repetition_time: f64,
    pub volumes: u32,
    pub behavior_dir: PathBuf,
    pub output_root: PathBuf,
    pub conditions: Option<Vec<String>>,
}

impl OnsetRequest {
    pub fn run_duration(&self) -> f64 {
        self.repetition_time * f64::from(self.volumes)
    }
}

/// Onsets and durations per condition, in log order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConditionTimings {
    pub onsets: BTreeMap<String, Vec<f64>>,
    pub durations: BTreeMap<String, Vec<f64>>,
}

impl ConditionTimings {
    fn push(&mut self, trial: Trial) {
        self.durations
            .entry(trial.condition.clone())
            .or_default()
            .push(trial.duration);
        self.onsets.entry(trial.condition).or_default().push(trial.onset);
    }

    fn retain(&mut self, conditions: &[String]) {
        self.onsets.retain(|c, _| conditions.contains(c));
        self.durations.retain(|c, _| conditions.contains(c));
    }
}

/// Add one run's log. The first row fixes time zero; the first unparseable
/// row after it ends the run.
pub fn accumulate_run(
    timings: &mut ConditionTimings,
    text: &str,
    layout: &LogLayout,
    run_index: usize,
    run_duration: f64,
    source: &Path,
) -> Result<usize> {
    let mut lines = text.lines();
    let first_line = lines.next().unwrap_or_default();
    let first = layout.parse_row(first_line.trim_end_matches('\r')).map_err(|e| {
        PrepError::Parse(format!("{} line 1: {}", source.display(), e))
    })?;
    let t0 = first.onset;
    let offset = run_index as f64 * run_duration;

    let mut count = 0;
    let mut trial = first;
    let mut line_no = 1;
    loop {
        trial.onset = trial.onset - t0 + offset;
        timings.push(trial);
        count += 1;

        let Some(line) = lines.next() else { break };
        line_no += 1;
        match layout.parse_row(line.trim_end_matches('\r')) {
            Ok(next) => trial = next,
            Err(e) => {
                debug!("{} line {}: stopping ({})", source.display(), line_no, e);
                break;
            }
        }
    }
    Ok(count)
}

/// Behavioral logs for one subject and task, in run order.
pub fn find_logs(request: &OnsetRequest) -> Result<Vec<PathBuf>> {
    let dir = request.behavior_dir.join(&request.subject);
    let pattern = FilenamePattern::new(&format!("s*_*{}*", request.task))?;
    let logs = pattern.files_in(&dir)?;
    if logs.is_empty() {
        return Err(PrepError::Parse(format!(
            "no behavioral logs matching {} in {}",
            pattern.as_str(),
            dir.display()
        )));
    }
    Ok(logs)
}

pub fn collect_timings(request: &OnsetRequest, layout: &LogLayout) -> Result<ConditionTimings> {
    let mut timings = ConditionTimings::default();
    for (idx, log) in find_logs(request)?.iter().enumerate() {
        info!("Processing {}", log.display());
        let text = fs::read_to_string(log)?;
        let trials = accumulate_run(&mut timings, &text, layout, idx, request.run_duration(), log)?;
        debug!("{} trials in run {}", trials, idx + 1);
    }
    if let Some(conditions) = &request.conditions {
        timings.retain(conditions);
    }
    Ok(timings)
}

fn write_values(path: &Path, values: &[f64]) -> Result<()> {
    let mut text = String::new();
    for v in values {
        text.push_str(&v.to_string());
        text.push('\n');
    }
    fs::write(path, text)?;
    Ok(())
}

/// Write `<subject>_<cond>.txt` and `<subject>_<cond>_dur.txt` under `<root>/<TSK>/`.
pub fn write_timings(request: &OnsetRequest, timings: &ConditionTimings) -> Result<Vec<PathBuf>> {
    let out_dir = request.output_root.join(&request.study_task);
    fs::create_dir_all(&out_dir)?;

    let mut written = Vec::new();
    for (condition, onsets) in &timings.onsets {
        let path = out_dir.join(format!("{}_{}.txt", request.subject, condition));
        write_values(&path, onsets)?;
        written.push(path);
    }
    for (condition, durations) in &timings.durations {
        let path = out_dir.join(format!("{}_{}_dur.txt", request.subject, condition));
        write_values(&path, durations)?;
        written.push(path);
    }
    Ok(written)
}

pub fn run(request: &OnsetRequest, layout: &LogLayout) -> Result<Vec<PathBuf>> {
    let timings = collect_timings(request, layout)?;
    let written = write_timings(request, &timings)?;
    info!(
        "Wrote timing files for {} conditions to {}",
        timings.onsets.len(),
        request.output_root.join(&request.study_task).display()
    );
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cond: &str, totaldur: f64, rtf: f64, onset: f64) -> String {
        format!("s001\t{cond} \t{totaldur}\t1\t2\t0\t0\t0\t{rtf}\t0\t{onset}\n")
    }

    #[test]
    fn test_first_row_is_time_zero_and_runs_are_offset() {
        let layout = LogLayout::default();
        let mut timings = ConditionTimings::default();
        let run1 = [row("self", 4.0, 1.5, 10.0), row("other", 4.0, 0.0, 16.0)].concat();
        let run2 = [row("self", 4.0, 2.0, 3.0), row("self", 4.0, 0.0, 9.5)].concat();

        accumulate_run(&mut timings, &run1, &layout, 0, 300.0, Path::new("r1")).unwrap();
        accumulate_run(&mut timings, &run2, &layout, 1, 300.0, Path::new("r2")).unwrap();

        assert_eq!(timings.onsets["self"], vec![0.0, 300.0, 306.5]);
        assert_eq!(timings.onsets["other"], vec![6.0]);
        // rtf when responded, otherwise totaldur
        assert_eq!(timings.durations["self"], vec![1.5, 2.0, 4.0]);
        assert_eq!(timings.durations["other"], vec![4.0]);
    }

    #[test]
    fn test_trailing_summary_ends_the_run() {
        let layout = LogLayout::default();
        let mut timings = ConditionTimings::default();
        let text = [
            row("a", 2.0, 0.0, 1.0),
            row("a", 2.0, 0.0, 3.0),
            "total\t42\n".to_string(),
            row("a", 2.0, 0.0, 5.0),
        ]
        .concat();
        let n = accumulate_run(&mut timings, &text, &layout, 0, 100.0, Path::new("r")).unwrap();
        assert_eq!(n, 2);
        assert_eq!(timings.onsets["a"], vec![0.0, 2.0]);
    }

    #[test]
    fn test_malformed_first_row_is_an_error() {
        let layout = LogLayout::default();
        let mut timings = ConditionTimings::default();
        let err = accumulate_run(&mut timings, "header\tline\n", &layout, 0, 1.0, Path::new("r"))
            .unwrap_err();
        assert!(matches!(err, PrepError::Parse(_)));
    }

    #[test]
    fn test_custom_layout_and_duration_column() {
        let columns = vec!["onset".to_string(), "trialtype".to_string(), "len".to_string()];
        let layout = LogLayout::new(columns, "onset", Some("len")).unwrap();
        let mut timings = ConditionTimings::default();
        accumulate_run(&mut timings, "5\tcue\t0.5\n7\tcue\t0.25\n", &layout, 0, 0.0, Path::new("r"))
            .unwrap();
        assert_eq!(timings.onsets["cue"], vec![0.0, 2.0]);
        assert_eq!(timings.durations["cue"], vec![0.5, 0.25]);
    }

    #[test]
    fn test_layout_requires_known_columns() {
        let columns = vec!["onset".to_string(), "trialtype".to_string()];
        assert!(matches!(
            LogLayout::new(columns, "onset", None),
            Err(PrepError::InvalidArgument(_))
        ));
    }
}
