use anyhow::Result;
use std::{collections::BTreeMap, fs, io::Write, path::Path};
use tempfile::tempdir;
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

use youthjobs::{
    config::{Config, OutputConfig},
    error::PipelineError,
    load::load_sources,
    process::{self, PipelineOptions},
    quarter::QuarterKey,
    schema::Metric,
    sources::SourceSlot,
};

const YOUTH: &str = "\
date,age_group,youth_unemployment_rate
2020-01-01,overall,10.0
2020-02-01,overall,11.0
2020-03-01,overall,12.0
2020-03-01,15-19,30.0
2020-04-01,overall,10.0
2020-07-01,overall,9.0
2020-10-01,overall,8.0
";

const SKILLS: &str = "\
quarter,skills_related
2020-Q2,5.0
2020-Q3,6.0
";

const TIME: &str = "\
Quarter,Rate
Q2 2020,2.0
Q3 2020,1.0
";

const LABOUR: &str = "\
date,state,participation,unemployment
2020-04-01,Penang,68,3.0
2020-04-01,Johor,66,4.0
2020-04-01,Malaysia,67,3.5
2021-01-01,Johor,65,4.2
";

const CPI: &str = "\
date,negeri,division,index
2020-04-01,Pulau Pinang,overall,120.0
2020-04-01,Pulau Pinang,food,130.0
2020-07-01,Sabah,overall,118.0
";

fn write(dir: &Path, name: &str, text: &str) -> Result<String> {
    let path = dir.join(name);
    fs::write(&path, text)?;
    Ok(path.display().to_string())
}

fn paths(dir: &Path) -> Result<BTreeMap<SourceSlot, String>> {
    Ok(BTreeMap::from([
        (SourceSlot::YouthUnemployment, write(dir, "youth.csv", YOUTH)?),
        (SourceSlot::SkillsUnderemployment, write(dir, "skills.csv", SKILLS)?),
        (SourceSlot::TimeUnderemployment, write(dir, "time.csv", TIME)?),
        (SourceSlot::LabourForceState, write(dir, "labour.csv", LABOUR)?),
        (SourceSlot::CpiState, write(dir, "cpi.csv", CPI)?),
    ]))
}

fn q(year: i32, quarter: u8) -> QuarterKey {
    QuarterKey::new(year, quarter).unwrap()
}

#[test]
fn untrimmed_run_keeps_every_key() -> Result<()> {
    let dir = tempdir()?;
    let sources = load_sources(&paths(dir.path())?, None);
    let options = PipelineOptions {
        trim_to_core: false,
        ..PipelineOptions::default()
    };
    let session = process::run(sources, &options)?;

    // every quarter of every source survives the outer joins
    assert_eq!(
        session.quarters(),
        &[q(2020, 1), q(2020, 2), q(2020, 3), q(2020, 4), q(2021, 1)]
    );
    let states: Vec<&str> = session.states().iter().map(String::as_str).collect();
    assert_eq!(states, vec!["Johor", "Pulau Pinang", "Sabah"]);

    let rows = session.table().rows();
    let find = |quarter: QuarterKey, state: Option<&str>| {
        rows.iter()
            .find(|r| r.quarter == quarter && r.state.as_deref() == state)
            .unwrap()
    };

    // monthly youth rows averaged, the 15-19 breakdown filtered out
    assert_eq!(find(q(2020, 1), None).youth_unemp_rate, Some(11.0));

    let penang = find(q(2020, 2), Some("Pulau Pinang"));
    assert_eq!(penang.p_rate, Some(68.0));
    assert_eq!(penang.cpi_index, Some(120.0));
    assert_eq!(penang.youth_unemp_rate, Some(10.0));
    assert_eq!(penang.ymi, Some(7.7));

    // state row without national data keeps its state metrics
    let johor_2021 = find(q(2021, 1), Some("Johor"));
    assert_eq!(johor_2021.u_rate, Some(4.2));
    assert_eq!(johor_2021.youth_unemp_rate, None);

    // the "Malaysia" total never becomes a state
    assert!(!session.states().contains("Malaysia"));
    assert_eq!(session.coverage().get(Metric::Ymi).unwrap().range_label(), "2020Q2..2020Q3");
    Ok(())
}

#[test]
fn trimmed_run_keeps_core_intersection() -> Result<()> {
    let dir = tempdir()?;
    let sources = load_sources(&paths(dir.path())?, None);
    let session = process::run(sources, &PipelineOptions::default())?;

    assert!(session.trimmed());
    assert_eq!(session.quarters(), &[q(2020, 2), q(2020, 3)]);
    for quarter in session.quarters() {
        for metric in Metric::CORE {
            assert!(session
                .table()
                .rows()
                .iter()
                .any(|r| r.quarter == *quarter && r.get(metric).is_some()));
        }
    }
    Ok(())
}

#[test]
fn identical_inputs_give_identical_files() -> Result<()> {
    let dir = tempdir()?;
    let sources = paths(dir.path())?;
    let mut outputs = Vec::new();
    for run in ["a", "b"] {
        let output = OutputConfig {
            dir: dir.path().join(run),
            ..OutputConfig::default()
        };
        let session = process::run(load_sources(&sources, None), &PipelineOptions::default())?;
        session.write_outputs(&output)?;
        outputs.push(output.dir);
    }
    for name in ["merged.csv", "merged.parquet", "coverage.json", "diagnostics.json"] {
        assert_eq!(
            fs::read(outputs[0].join(name))?,
            fs::read(outputs[1].join(name))?,
            "{name} differs between runs"
        );
    }
    Ok(())
}

#[test]
fn missing_mandatory_source_aborts() -> Result<()> {
    let dir = tempdir()?;
    let mut sources = paths(dir.path())?;
    sources.insert(
        SourceSlot::YouthUnemployment,
        dir.path().join("nope_*.csv").display().to_string(),
    );
    match process::run(load_sources(&sources, None), &PipelineOptions::default()) {
        Err(PipelineError::InsufficientSources { missing }) => {
            assert_eq!(missing, vec![SourceSlot::YouthUnemployment]);
        }
        other => panic!("expected InsufficientSources, got {:?}", other.map(|s| s.table().len())),
    }
    Ok(())
}

#[test]
fn bundle_and_config_drive_a_run() -> Result<()> {
    let dir = tempdir()?;
    let bundle = dir.path().join("sources.zip");
    {
        let mut zip = zip::ZipWriter::new(fs::File::create(&bundle)?);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
        for (name, text) in [
            ("youth_unemployment.csv", YOUTH),
            ("skills_underemployment.csv", SKILLS),
            ("notes.txt", "ignored"),
        ] {
            zip.start_file(name, options)?;
            zip.write_all(text.as_bytes())?;
        }
        zip.finish()?;
    }
    let yaml = format!(
        "bundle: {}\nrequired: [youth_unemployment, skills_underemployment]\noutput:\n  dir: {}\n",
        bundle.display(),
        dir.path().join("out").display()
    );
    let config = Config::from_yaml(&yaml)?;
    let session = process::run(
        load_sources(&config.sources, config.bundle.as_deref()),
        &config.pipeline_options(),
    )?;
    assert_eq!(session.quarters(), &[q(2020, 2), q(2020, 3)]);
    assert!(session.states().is_empty());

    let written = session.write_outputs(&config.output)?;
    assert_eq!(written.len(), 4);
    let coverage: serde_json::Value =
        serde_json::from_slice(&fs::read(config.output.dir.join("coverage.json"))?)?;
    assert_eq!(coverage[3]["metric"], "youth_unemp_rate");
    assert_eq!(coverage[3]["first_quarter"], "2020Q2");
    Ok(())
}
