mod attendance;
mod auth;
mod config;
mod reports;
mod roster;
mod session_guard;
mod store;

use crate::attendance::{AttendanceLog, AttendanceStatus, COURSES};
use crate::auth::CurrentUser;
use crate::config::AppConfig;
use crate::reports::ReportFilter;
use crate::roster::{NewStudent, Roster};
use crate::session_guard::{GuardEvent, SessionGuard};
use crate::store::DataStore;
use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;

#[derive(Parser)]
#[command(name = "avs-attendance")]
#[command(about = "College attendance administration for AVS staff")]
#[command(version)]
struct Cli {
    /// Data directory override (defaults to ~/.avs-attendance)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Log in as a staff member
    Login { username: String, password: String },
    /// Log out the current staff member
    Logout,
    /// Manage the student roster
    Student {
        #[command(subcommand)]
        command: StudentCommand,
    },
    /// Mark attendance for one student (date defaults to today)
    Mark {
        student_id: String,
        /// present, absent or late
        status: String,
        /// Course name (quoted), matched case-insensitively
        course: String,
        #[arg(long)]
        date: Option<String>,
    },
    /// Mark every student on the roster for one course/day
    MarkAll {
        /// present, absent or late
        status: String,
        /// Course name (quoted), matched case-insensitively
        course: String,
        #[arg(long)]
        date: Option<String>,
    },
    /// Show aggregated attendance reports
    Report {
        #[arg(long)]
        course: Option<String>,
        /// Limit to one college-issued student ID
        #[arg(long)]
        student: Option<String>,
        /// Inclusive start date (YYYY-MM-DD)
        #[arg(long)]
        from: Option<String>,
        /// Inclusive end date (YYYY-MM-DD)
        #[arg(long)]
        to: Option<String>,
    },
    /// Export the per-student report as CSV
    Export {
        path: PathBuf,
        #[arg(long)]
        course: Option<String>,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
    },
    /// List the course catalogue
    Courses,
    /// Interactive session with idle-timeout enforcement
    Shell,
}

#[derive(Subcommand)]
enum StudentCommand {
    /// Add a student to the roster
    Add {
        name: String,
        student_id: String,
        department: String,
        batch: String,
        #[arg(long, default_value = "")]
        email: String,
        #[arg(long, default_value = "")]
        phone: String,
        /// Path to a stored photo file
        #[arg(long)]
        photo: Option<String>,
        /// Enrollment date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        enrollment_date: Option<String>,
    },
    /// List the full roster
    List,
    /// Search by name, student ID or department
    Search { term: String },
    /// Remove a student by college-issued ID
    Remove { student_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let (config, store) = open_store(cli.data_dir)?;

    match cli.command {
        Command::Login { username, password } => login(&store, &username, &password),
        Command::Logout => {
            store.clear_current_user()?;
            println!("Logged out.");
            Ok(())
        }
        Command::Student { command } => {
            let user = require_login(&store)?;
            run_student_command(&store, &user, command)
        }
        Command::Mark {
            student_id,
            status,
            course,
            date,
        } => {
            let user = require_login(&store)?;
            mark_one(&store, &user, &student_id, &status, &course, date.as_deref())
        }
        Command::MarkAll {
            status,
            course,
            date,
        } => {
            let user = require_login(&store)?;
            mark_all(&store, &user, &status, &course, date.as_deref())
        }
        Command::Report {
            course,
            student,
            from,
            to,
        } => {
            require_login(&store)?;
            let filter = build_filter(course, student, from.as_deref(), to.as_deref())?;
            let (students, records) = store.load_records()?;
            print_report(&students, &records, &filter);
            Ok(())
        }
        Command::Export {
            path,
            course,
            from,
            to,
        } => {
            require_login(&store)?;
            let filter = build_filter(course, None, from.as_deref(), to.as_deref())?;
            let (students, records) = store.load_records()?;
            let reports = reports::student_reports(&students, &records, &filter);
            let file = std::fs::File::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            reports::export_csv(file, &reports)?;
            println!("Report exported to {}", path.display());
            Ok(())
        }
        Command::Courses => {
            for course in COURSES {
                println!("{course}");
            }
            Ok(())
        }
        Command::Shell => run_shell(config, store).await,
    }
}

/// Resolves the data directory and loads the configuration.
///
/// The CLI flag wins; otherwise `config.json` in the default directory may
/// redirect where records live.
fn open_store(data_dir_flag: Option<PathBuf>) -> Result<(AppConfig, DataStore)> {
    if let Some(dir) = data_dir_flag {
        let store = DataStore::open(dir)?;
        let config = AppConfig::load(&store.config_path())?;
        return Ok((config, store));
    }
    let default_dir = store::default_data_dir()?;
    let config = AppConfig::load(&default_dir.join("config.json"))?;
    let dir = config.data_dir.clone().unwrap_or(default_dir);
    let store = DataStore::open(dir)?;
    Ok((config, store))
}

fn login(store: &DataStore, username: &str, password: &str) -> Result<()> {
    let Some(account) = auth::authenticate(username, password) else {
        bail!("Invalid username or password");
    };
    store.set_current_user(&CurrentUser::new(account))?;
    println!("Welcome, {} ({})", account.name, account.role);
    Ok(())
}

fn require_login(store: &DataStore) -> Result<CurrentUser> {
    store
        .current_user()?
        .context("Not logged in. Run `avs-attendance login <username> <password>` first.")
}

fn parse_date(input: Option<&str>) -> Result<NaiveDate> {
    match input {
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .with_context(|| format!("Invalid date (expected YYYY-MM-DD): {raw}")),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

fn build_filter(
    course: Option<String>,
    student: Option<String>,
    from: Option<&str>,
    to: Option<&str>,
) -> Result<ReportFilter> {
    if let Some(course) = &course {
        if attendance::resolve_course(course).is_none() {
            bail!("Unknown course: {course}");
        }
    }
    Ok(ReportFilter {
        course,
        student_id: student,
        from: from.map(|raw| parse_date(Some(raw))).transpose()?,
        to: to.map(|raw| parse_date(Some(raw))).transpose()?,
    })
}

fn run_student_command(store: &DataStore, user: &CurrentUser, command: StudentCommand) -> Result<()> {
    let (students, records) = store.load_records()?;
    let mut roster = Roster::new(students);

    match command {
        StudentCommand::Add {
            name,
            student_id,
            department,
            batch,
            email,
            phone,
            photo,
            enrollment_date,
        } => {
            let student = roster.add(NewStudent {
                name,
                student_id,
                department,
                batch,
                email,
                phone,
                photo,
                enrollment_date: parse_date(enrollment_date.as_deref())?,
            })?;
            println!("Added {} ({})", student.name, student.student_id);
            tracing::info!(by = %user.username, "student added");
            store.save_records(roster.students(), &records)?;
        }
        StudentCommand::List => {
            print_students(roster.students().iter());
            println!("Total students: {}", roster.len());
        }
        StudentCommand::Search { term } => {
            let matches = roster.search(&term);
            if matches.is_empty() {
                println!("No students match '{term}'");
            } else {
                print_students(matches.into_iter());
            }
        }
        StudentCommand::Remove { student_id } => {
            let removed = roster.remove(&student_id)?;
            println!("Removed {} ({})", removed.name, removed.student_id);
            store.save_records(roster.students(), &records)?;
        }
    }
    Ok(())
}

fn print_students<'a>(students: impl Iterator<Item = &'a roster::Student>) {
    println!(
        "{:<10} {:<24} {:<8} {:<12} {}",
        "ID", "Name", "Dept", "Batch", "Enrolled"
    );
    for s in students {
        println!(
            "{:<10} {:<24} {:<8} {:<12} {}",
            s.student_id, s.name, s.department, s.batch, s.enrollment_date
        );
    }
}

fn mark_one(
    store: &DataStore,
    user: &CurrentUser,
    student_id: &str,
    status: &str,
    course: &str,
    date: Option<&str>,
) -> Result<()> {
    let (students, records) = store.load_records()?;
    let roster = Roster::new(students);
    let Some(student) = roster.find_by_student_id(student_id) else {
        bail!("No student with ID {student_id}");
    };
    let status: AttendanceStatus = status.parse()?;
    let date = parse_date(date)?;

    let mut log = AttendanceLog::new(records);
    let outcome = log.mark(&student.student_id, date, status, course, &user.username)?;
    store.save_records(roster.students(), log.records())?;

    match outcome {
        attendance::MarkOutcome::Created => {
            println!("Marked {} {} on {}", student.name, status, date)
        }
        attendance::MarkOutcome::Updated => {
            println!("Updated {} to {} on {}", student.name, status, date)
        }
    }
    Ok(())
}

fn mark_all(
    store: &DataStore,
    user: &CurrentUser,
    status: &str,
    course: &str,
    date: Option<&str>,
) -> Result<()> {
    let (students, records) = store.load_records()?;
    let roster = Roster::new(students);
    if roster.is_empty() {
        bail!("The roster is empty; add students first");
    }
    let status: AttendanceStatus = status.parse()?;
    let date = parse_date(date)?;
    let ids: Vec<String> = roster
        .students()
        .iter()
        .map(|s| s.student_id.clone())
        .collect();

    let mut log = AttendanceLog::new(records);
    let marked = log.mark_all(&ids, date, status, course, &user.username)?;
    store.save_records(roster.students(), log.records())?;
    let counts = log.day_counts(date, course);
    println!(
        "Marked {marked} students on {date}: {} present, {} absent, {} late",
        counts.present, counts.absent, counts.late
    );
    Ok(())
}

fn print_report(
    students: &[roster::Student],
    records: &[attendance::AttendanceRecord],
    filter: &ReportFilter,
) {
    let student_rows = reports::student_reports(students, records, filter);
    let summary = reports::summary(&student_rows);

    println!(
        "Students: {}  Average: {}%  Highest: {}%  Lowest: {}%",
        summary.total_students,
        summary.average_attendance,
        summary.highest_attendance,
        summary.lowest_attendance
    );
    println!();
    println!(
        "{:<10} {:<24} {:>7} {:>8} {:>7} {:>5}",
        "ID", "Name", "Classes", "Present", "Absent", "%"
    );
    for row in &student_rows {
        println!(
            "{:<10} {:<24} {:>7} {:>8} {:>7} {:>4}%",
            row.student_id,
            row.name,
            row.total_classes,
            row.present_classes,
            row.absent_classes,
            row.attendance_percentage
        );
    }

    let course_rows = reports::course_stats(records, filter);
    if !course_rows.is_empty() {
        println!();
        println!("{:<40} {:>8} {:>8} {:>5}", "Course", "Records", "Present", "%");
        for stat in &course_rows {
            println!(
                "{:<40} {:>8} {:>8} {:>4}%",
                stat.course, stat.total_records, stat.present_records, stat.percentage
            );
        }
    }

    println!();
    for bucket in reports::distribution(&student_rows) {
        println!("{:<10} {}", bucket.range, bucket.count);
    }
}

enum ShellOutcome {
    Continue,
    /// Leave the shell but stay logged in.
    Quit,
    /// Clear the marker and leave.
    Logout,
}

fn print_prompt() {
    print!("avs> ");
    let _ = std::io::stdout().flush();
}

async fn prompt_login(lines: &mut Lines<BufReader<Stdin>>, store: &DataStore) -> Result<CurrentUser> {
    loop {
        print!("Username: ");
        let _ = std::io::stdout().flush();
        let Some(username) = lines.next_line().await.context("Failed to read stdin")? else {
            bail!("Login aborted");
        };
        print!("Password: ");
        let _ = std::io::stdout().flush();
        let Some(password) = lines.next_line().await.context("Failed to read stdin")? else {
            bail!("Login aborted");
        };

        match auth::authenticate(username.trim(), password.trim()) {
            Some(account) => {
                let user = CurrentUser::new(account);
                store.set_current_user(&user)?;
                println!("Welcome, {} ({})", account.name, account.role);
                return Ok(user);
            }
            None => println!("Invalid username or password"),
        }
    }
}

/// Interactive session: every entered line doubles as a user-presence
/// signal, the guard runs in the background, and expiry clears the
/// authenticated-user marker before exiting.
async fn run_shell(config: AppConfig, store: DataStore) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let user = match store.current_user()? {
        Some(user) => {
            println!("Resuming session for {}", user.name);
            user
        }
        None => prompt_login(&mut lines, &store).await?,
    };

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let guard = SessionGuard::spawn(config.session.guard_config(), event_tx)?;
    guard.start();

    let (students, records) = store.load_records()?;
    let roster = Roster::new(students);
    let mut log = AttendanceLog::new(records);

    println!(
        "Type `help` for commands. The session times out after {} minutes of inactivity.",
        config.session.timeout_secs / 60
    );
    print_prompt();

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    guard.stop();
                    break;
                };
                guard.on_activity();
                let outcome = handle_shell_command(
                    line.trim(),
                    &user,
                    &store,
                    &roster,
                    &mut log,
                    &guard,
                )
                .await?;
                match outcome {
                    ShellOutcome::Continue => print_prompt(),
                    ShellOutcome::Quit => {
                        guard.stop();
                        break;
                    }
                    ShellOutcome::Logout => {
                        guard.stop();
                        store.clear_current_user()?;
                        println!("Logged out.");
                        break;
                    }
                }
            }
            event = event_rx.recv() => {
                match event {
                    Some(GuardEvent::Warning { remaining }) => {
                        let secs = remaining.as_secs();
                        println!(
                            "\nSession expiring in {}m {:02}s - type `continue` to stay logged in or `logout` to leave.",
                            secs / 60,
                            secs % 60
                        );
                    }
                    Some(GuardEvent::WarningCleared) => {
                        println!("Session extended successfully.");
                        print_prompt();
                    }
                    Some(GuardEvent::Expired) => {
                        store.clear_current_user()?;
                        println!("\nSession expired. Please login again.");
                        break;
                    }
                    None => break,
                }
            }
        }
    }
    Ok(())
}

async fn handle_shell_command(
    line: &str,
    user: &CurrentUser,
    store: &DataStore,
    roster: &Roster,
    log: &mut AttendanceLog,
    guard: &SessionGuard,
) -> Result<ShellOutcome> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    match tokens.as_slice() {
        [] => {}
        ["help"] => {
            println!("Commands:");
            println!("  students                      list the roster");
            println!("  courses                       list the course catalogue");
            println!("  mark <id> <status> <course>   mark attendance for today");
            println!("  report                        show the attendance report");
            println!("  continue                      keep the session alive from a warning");
            println!("  logout                        log out and leave");
            println!("  quit                          leave without logging out");
        }
        ["students"] => print_students(roster.students().iter()),
        ["courses"] => {
            for course in COURSES {
                println!("{course}");
            }
        }
        ["mark", student_id, status, course @ ..] if !course.is_empty() => {
            let course = course.join(" ");
            match shell_mark(user, roster, log, student_id, status, &course) {
                Ok(message) => {
                    store.save_records(roster.students(), log.records())?;
                    println!("{message}");
                }
                Err(e) => println!("{e:#}"),
            }
        }
        ["report"] => print_report(roster.students(), log.records(), &ReportFilter::default()),
        ["continue"] => {
            if !guard.continue_session().await {
                println!("No expiry warning is active.");
            }
        }
        ["logout"] => return Ok(ShellOutcome::Logout),
        ["quit"] | ["exit"] => return Ok(ShellOutcome::Quit),
        _ => println!("Unknown command (type `help`)"),
    }
    Ok(ShellOutcome::Continue)
}

fn shell_mark(
    user: &CurrentUser,
    roster: &Roster,
    log: &mut AttendanceLog,
    student_id: &str,
    status: &str,
    course: &str,
) -> Result<String> {
    let Some(student) = roster.find_by_student_id(student_id) else {
        bail!("No student with ID {student_id}");
    };
    let status: AttendanceStatus = status.parse()?;
    let date = chrono::Local::now().date_naive();
    log.mark(&student.student_id, date, status, course, &user.username)?;
    Ok(format!("Marked {} {} on {}", student.name, status, date))
}
