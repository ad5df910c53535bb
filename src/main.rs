//! Command-line driver.
//!
//! Two commands: `build` runs the full pipeline from a workbook plus a
//! preference survey and writes the output copy; `validate` re-checks
//! an already-populated workbook. Exit codes: 0 ok, 1 validation
//! findings at error severity, 2 infeasibility, 3 I/O or data failure.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{error, info};

use rotamaker::io::survey::Survey;
use rotamaker::io::workbook::Workbook;
use rotamaker::io::writer::ScheduleWriter;
use rotamaker::models::{
    BlockCalendar, NfRules, Phase, RequirementTable, ScheduleGrid,
};
use rotamaker::tracks::TrackSet;
use rotamaker::validation::validate;
use rotamaker::{build_schedule, Error, PipelineConfig};

#[derive(Parser)]
#[command(name = "rotamaker", about = "Residency rotation schedule builder", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build the full schedule from a workbook and a preference survey.
    Build {
        /// Scheduling workbook (.xlsm).
        input: PathBuf,
        /// Preference survey responses (.xlsx).
        prefs: PathBuf,
        /// Validate and report only; write nothing.
        #[arg(long)]
        dry_run: bool,
        /// Output workbook path (default: <input>_output.xlsm).
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Academic year start (default: the workbook's Overview cell).
        #[arg(short, long)]
        year: Option<i32>,
    },
    /// Validate an already-populated workbook.
    Validate {
        /// Scheduling workbook (.xlsm).
        input: PathBuf,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Build {
            input,
            prefs,
            dry_run,
            output,
            year,
        } => build(input, prefs, dry_run, output, year),
        Command::Validate { input } => run_validate(input),
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            let exit: u8 = match err.downcast_ref::<Error>() {
                Some(Error::Infeasible { .. }) => 2,
                Some(Error::DataIntegrity(_)) | Some(Error::Workbook(_)) => 3,
                Some(Error::Io(_)) => 3,
                _ => 3,
            };
            ExitCode::from(exit)
        }
    }
}

fn build(
    input: PathBuf,
    prefs: PathBuf,
    dry_run: bool,
    output: Option<PathBuf>,
    year: Option<i32>,
) -> anyhow::Result<ExitCode> {
    let workbook = Workbook::open(&input).context("reading workbook")?;
    let year = match year {
        Some(y) => y,
        None => workbook.academic_year()?,
    };
    info!(year, "academic year {year}-{}", year + 1);

    let calendar = BlockCalendar::for_year(year);
    let catalog = workbook.rotation_catalog()?;
    let mut residents = workbook.roster()?;
    info!(
        residents = residents.len(),
        codes = catalog.len(),
        "roster and rotation key loaded"
    );

    // Survey first; the recs tab is authoritative and overrides it.
    let survey = Survey::open(&prefs).context("reading preference survey")?;
    survey.apply(&mut residents, &calendar);
    workbook.apply_r34_recs(&mut residents)?;
    workbook.verify_codes(&residents, &catalog)?;

    let r1_count = residents.iter().filter(|r| r.r_year == 1).count();
    let r2_count = residents.iter().filter(|r| r.r_year == 2).count();
    let (r1_base, _) = workbook.track_base("R1 Tracks")?;
    let (r2_base, _) = workbook.track_base("R2 Tracks")?;
    let r1_tracks = TrackSet::derive(&r1_base, r1_count);
    let r2_tracks = TrackSet::derive(&r2_base, r2_count);
    for warning in r1_tracks.warnings.iter().chain(&r2_tracks.warnings) {
        info!(?warning, "track derivation");
    }

    let requirements = RequirementTable::standard();
    let envelope = workbook.staffing_envelope();
    let config = PipelineConfig::default();

    let outcome = build_schedule(
        &residents,
        &r1_tracks,
        &r2_tracks,
        &calendar,
        &requirements,
        &envelope,
        &catalog,
        &config,
        None,
    )?;

    let report = outcome.report.as_ref().expect("ungated build validates");
    println!("{}", report.render());

    if dry_run {
        info!("dry run; no output written");
    } else {
        let writer = ScheduleWriter::create(&input, output.as_deref())?;
        writer.write_base_schedule(&outcome.grid)?;
        writer.write_night_float(&outcome.grid)?;
        info!(path = %writer.output_path().display(), "schedule written");
    }

    Ok(if report.ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

fn run_validate(input: PathBuf) -> anyhow::Result<ExitCode> {
    let workbook = Workbook::open(&input).context("reading workbook")?;
    let mut residents = workbook.roster()?;
    workbook.apply_r34_recs(&mut residents)?;

    // Rebuild the grid from the workbook's populated cells.
    let names: Vec<String> = residents.iter().map(|r| r.name.clone()).collect();
    let mut grid = ScheduleGrid::new(&names)?;
    grid.begin_phase(Phase::R1Tracks);
    for (name, cells) in workbook.base_schedule_cells()? {
        if !names.contains(&name) {
            continue;
        }
        for (week, code) in cells.iter().enumerate() {
            if let Some(code) = code {
                grid.assign(&name, week, code)?;
            }
        }
    }
    for (name, weeks) in workbook.night_float_cells()? {
        if !names.contains(&name) {
            continue;
        }
        for (week, code) in weeks {
            grid.assign_nf(&name, week, &code)?;
        }
    }

    let report = validate(
        &residents,
        &grid,
        &RequirementTable::standard(),
        &workbook.staffing_envelope(),
        &NfRules::default(),
    );
    println!("{}", report.render());

    Ok(if report.ok() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}
