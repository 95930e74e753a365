//! Course Catalog CLI
//!
//! Command-line interface for reading and extending the course catalog
//! document without going through the HTTP server.
//!
//! # Usage
//!
//! ```bash
//! catalog --help
//! catalog list
//! catalog show CS101
//! catalog add --code CS101 --name "Intro" --instructor "Dr. Ada" ...
//! catalog health
//! ```

#![deny(unsafe_code)]

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use shared::models::{Course, CourseForm};
use shared::storage::{CourseStore, JsonFileCourseStore, WriteDiscipline};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Course catalog CLI - offline access to the course record store
#[derive(Parser)]
#[command(name = "catalog")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Course catalog document
    #[arg(
        short,
        long,
        env = "CATALOG_DATA_FILE",
        default_value = "course_catalog.json"
    )]
    file: PathBuf,

    /// API server URL
    #[arg(long, env = "CATALOG_API_URL", default_value = "http://localhost:8080")]
    api_url: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// List every course
    List {
        /// Print the courses as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show one course
    Show {
        /// Course code
        code: String,
    },
    /// Add a course
    Add(AddArgs),
    /// Print where the API health check lives
    Health,
}

#[derive(Args)]
struct AddArgs {
    /// Course code
    #[arg(long)]
    code: String,
    /// Course title
    #[arg(long)]
    name: String,
    /// Instructor
    #[arg(long)]
    instructor: String,
    /// Semester
    #[arg(long)]
    semester: String,
    /// Meeting schedule
    #[arg(long)]
    schedule: String,
    /// Classroom
    #[arg(long)]
    classroom: String,
    /// Required prior courses
    #[arg(long)]
    prerequisites: String,
    /// Grading scheme
    #[arg(long)]
    grading: String,
    /// Description
    #[arg(long)]
    description: String,
}

impl From<AddArgs> for CourseForm {
    fn from(args: AddArgs) -> Self {
        Self {
            code: args.code,
            name: args.name,
            instructor: args.instructor,
            semester: args.semester,
            schedule: args.schedule,
            classroom: args.classroom,
            prerequisites: args.prerequisites,
            grading: args.grading,
            description: args.description,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let stdout = std::io::stdout();
    run(cli, &mut stdout.lock())
}

fn run(cli: Cli, out: &mut impl Write) -> Result<()> {
    let store = JsonFileCourseStore::with_discipline(&cli.file, WriteDiscipline::Serialized);
    tracing::debug!(file = %cli.file.display(), "Using course store");

    match cli.command {
        Some(Commands::List { json }) => {
            let courses = store.load_all()?;
            if json {
                writeln!(out, "{}", serde_json::to_string_pretty(&courses)?)?;
            } else if courses.is_empty() {
                writeln!(out, "No courses in {}", cli.file.display())?;
            } else {
                for course in &courses {
                    writeln!(
                        out,
                        "{:<10} {:<30} {}",
                        course.code, course.name, course.instructor
                    )?;
                }
                writeln!(out, "{} course(s)", courses.len())?;
            }
        }
        Some(Commands::Show { code }) => {
            let Some(course) = store.find(&code)? else {
                bail!("No course found with code '{code}'");
            };
            print_course(out, &course)?;
        }
        Some(Commands::Add(args)) => {
            let course = CourseForm::from(args).into_course()?;
            let (code, name) = (course.code.clone(), course.name.clone());
            store
                .append(course)
                .with_context(|| format!("Failed to add course {code}"))?;
            tracing::info!(%code, "Course added");
            writeln!(out, "Course '{name}' added successfully!")?;
        }
        Some(Commands::Health) => {
            writeln!(out, "Health endpoint: {}/health", cli.api_url.trim_end_matches('/'))?;
        }
        None => {
            writeln!(out, "Course catalog CLI v{}", env!("CARGO_PKG_VERSION"))?;
            writeln!(out, "Use --help for usage information")?;
        }
    }

    Ok(())
}

fn print_course(out: &mut impl Write, course: &Course) -> Result<()> {
    let rows = [
        ("Code", &course.code),
        ("Name", &course.name),
        ("Instructor", &course.instructor),
        ("Semester", &course.semester),
        ("Schedule", &course.schedule),
        ("Classroom", &course.classroom),
        ("Prerequisites", &course.prerequisites),
        ("Grading", &course.grading),
        ("Description", &course.description),
    ];
    for (label, value) in rows {
        writeln!(out, "{label:<14} {value}")?;
    }
    Ok(())
}
