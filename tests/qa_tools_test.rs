use anyhow::Result;
use neuroprep::config::MotionConfig;
use neuroprep::onsets::{self, LogLayout, OnsetRequest};
use neuroprep::subject::SubjectId;
use neuroprep::{motion, sfnr};
use std::fs;
use tempfile::tempdir;

#[test]
fn test_motion_summary_per_subject() -> Result<()> {
    let temp = tempdir()?;
    let s001 = temp.path().join("s001");
    let s002 = temp.path().join("s002");
    fs::create_dir_all(&s001)?;
    fs::create_dir_all(&s002)?;
    fs::create_dir_all(temp.path().join("group"))?;

    fs::write(
        s001.join("run1.par"),
        "0 0 0 0 0 0\n0 0 0 0 0 1\n0 0 0 0 0 4\n",
    )?;
    fs::write(
        s001.join("run2.par"),
        "0 0 0 0 0 0\n0 0 0 0.25 0 0\n0 0 0 0.25 0 0\n",
    )?;

    let written = motion::run(temp.path(), None, &MotionConfig::default())?;
    // s002 has no .par files and is skipped
    assert_eq!(written, vec![temp.path().join("dists_s001.csv")]);

    let text = fs::read_to_string(&written[0])?;
    assert_eq!(text, "1,0.25\n3,0\nsmall\n1,2\n1,0\nbig\n1,2\n1,0\n");
    Ok(())
}

#[test]
fn test_motion_single_subject_filter() -> Result<()> {
    let temp = tempdir()?;
    for subject in ["s001", "s002"] {
        let dir = temp.path().join(subject);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("run1.par"), "0 0 0 0 0 0\n0 0 0 0 0 0\n")?;
    }

    // a bare number selects the same subject directory
    let only = SubjectId::parse("002")?;
    let written = motion::run(temp.path(), Some(&only), &MotionConfig::default())?;
    assert_eq!(written, vec![temp.path().join("dists_s002.csv")]);
    assert!(!temp.path().join("dists_s001.csv").exists());
    Ok(())
}

#[test]
fn test_onsets_end_to_end() -> Result<()> {
    let temp = tempdir()?;
    let behav = temp.path().join("behav").join("s001");
    fs::create_dir_all(&behav)?;
    let log = |rows: &[(&str, f64, f64, f64)]| -> String {
        rows.iter()
            .map(|(cond, total, rtf, onset)| {
                format!("s001\t{cond}\t{total}\t1\t1\t0\t0\t0\t{rtf}\t0\t{onset}\n")
            })
            .collect()
    };
    fs::write(
        behav.join("s001_1_selfref_run1.txt"),
        log(&[("self", 3.0, 1.25, 20.0), ("other", 3.0, 0.0, 26.0)]),
    )?;
    fs::write(
        behav.join("s001_2_selfref_run2.txt"),
        log(&[("self", 3.0, 0.0, 5.0)]),
    )?;
    // different task, ignored
    fs::write(behav.join("s001_1_faces_run1.txt"), log(&[("face", 1.0, 0.0, 0.0)]))?;

    let request = OnsetRequest {
        task: "selfref".to_string(),
        study_task: "SLF".to_string(),
        subject: "s001".to_string(),
        repetition_time: 2.0,
        volumes: 100,
        behavior_dir: temp.path().join("behav"),
        output_root: temp.path().join("onsets"),
        conditions: None,
    };
    let written = onsets::run(&request, &LogLayout::default())?;
    assert_eq!(written.len(), 4);

    let out = temp.path().join("onsets").join("SLF");
    assert_eq!(fs::read_to_string(out.join("s001_self.txt"))?, "0\n200\n");
    assert_eq!(fs::read_to_string(out.join("s001_self_dur.txt"))?, "1.25\n3\n");
    assert_eq!(fs::read_to_string(out.join("s001_other.txt"))?, "6\n");
    assert_eq!(fs::read_to_string(out.join("s001_other_dur.txt"))?, "3\n");
    assert!(!out.join("s001_face.txt").exists());
    Ok(())
}

#[test]
fn test_onsets_condition_filter() -> Result<()> {
    let temp = tempdir()?;
    let behav = temp.path().join("s001");
    fs::create_dir_all(&behav)?;
    fs::write(
        behav.join("s001_task.txt"),
        "s001\ta\t1\t1\t1\t0\t0\t0\t0\t0\t0\ns001\tb\t1\t1\t1\t0\t0\t0\t0\t0\t4\n",
    )?;

    let request = OnsetRequest {
        task: "task".to_string(),
        study_task: "TSK".to_string(),
        subject: "s001".to_string(),
        repetition_time: 1.0,
        volumes: 10,
        behavior_dir: temp.path().to_path_buf(),
        output_root: temp.path().join("out"),
        conditions: Some(vec!["b".to_string()]),
    };
    let written = onsets::run(&request, &LogLayout::default())?;
    assert_eq!(written.len(), 2);
    assert_eq!(fs::read_to_string(temp.path().join("out/TSK/s001_b.txt"))?, "4\n");
    Ok(())
}

#[test]
fn test_sfnr_report() -> Result<()> {
    let temp = tempdir()?;
    let report = temp.path().join("index.html");
    fs::write(
        &report,
        r#"<html><body>
        <p>mean <span class="imgmax">(max=1021.6)</span></p>
        <p>stdev <span class="imgmax">(max=12.4)</span></p>
        <p>sfnr <span class="imgmax">(max=143.27)</span></p>
        <p>mean <span class="imgmax">(max=998.0)</span></p>
        <p>stdev <span class="imgmax">(max=13.1)</span></p>
        <p>sfnr <span class="imgmax">(max=139.5)</span></p>
        </body></html>"#,
    )?;

    assert_eq!(sfnr::run(&report)?, "143.27,139.5");
    Ok(())
}
