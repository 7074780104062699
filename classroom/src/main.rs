use clap::{Parser, Subcommand};
use classroom::config::{Config, LoggingConfig, MetricsConfig};
use classroom::metrics_defs::{COMMAND_DURATION, COMMANDS_RUN, describe_workspace_metrics};
use classroom::{App, Backend, ScreenError, SetupError, View};
use serde::Serialize;
use session::{Role, SessionContext, SessionError};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_LOG_FILTER: &str = "classroom=info,fanout=info,session=info,docstore=info,warn";

#[derive(Parser)]
#[command(name = "classroom", about = "Role-gated classroom portal")]
struct Cli {
    /// Path to the YAML config file
    #[arg(long, short, default_value = "classroom.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    SignIn {
        email: String,
        #[arg(long)]
        password: String,
    },
    SignOut,
    Whoami,
    /// Linked teachers, or teachers of a subject
    Teachers {
        #[arg(long)]
        subject: Option<String>,
    },
    ChooseTeacher {
        teacher_id: String,
    },
    RemoveTeacher {
        teacher_id: String,
    },
    Questions {
        /// Teachers: only unanswered questions
        #[arg(long)]
        open: bool,
        /// Students: every question addressed to a linked teacher
        #[arg(long)]
        linked: bool,
    },
    Ask {
        teacher_id: String,
        text: String,
    },
    Answer {
        question_id: String,
        text: String,
    },
    Notices,
    PostNotice {
        title: String,
        #[arg(default_value = "")]
        body: String,
    },
    DeleteNotice {
        notice_id: String,
    },
    Homework,
    Assign {
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        due: Option<String>,
    },
    Grade {
        homework_id: String,
        student_id: String,
        grade: String,
    },
    Materials,
    Share {
        title: String,
        link: String,
    },
    Feedback,
    LeaveFeedback {
        teacher_id: String,
        rating: u8,
        #[arg(long, default_value = "")]
        comment: String,
    },
}

impl CliCommand {
    fn name(&self) -> &'static str {
        match self {
            CliCommand::SignIn { .. } => "sign-in",
            CliCommand::SignOut => "sign-out",
            CliCommand::Whoami => "whoami",
            CliCommand::Teachers { .. } => "teachers",
            CliCommand::ChooseTeacher { .. } => "choose-teacher",
            CliCommand::RemoveTeacher { .. } => "remove-teacher",
            CliCommand::Questions { .. } => "questions",
            CliCommand::Ask { .. } => "ask",
            CliCommand::Answer { .. } => "answer",
            CliCommand::Notices => "notices",
            CliCommand::PostNotice { .. } => "post-notice",
            CliCommand::DeleteNotice { .. } => "delete-notice",
            CliCommand::Homework => "homework",
            CliCommand::Assign { .. } => "assign",
            CliCommand::Grade { .. } => "grade",
            CliCommand::Materials => "materials",
            CliCommand::Share { .. } => "share",
            CliCommand::Feedback => "feedback",
            CliCommand::LeaveFeedback { .. } => "leave-feedback",
        }
    }
}

#[derive(thiserror::Error, Debug)]
enum CliError {
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error(transparent)]
    Screen(#[from] ScreenError),
    #[error("could not write output: {0}")]
    Output(#[from] serde_json::Error),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Whoami<'a> {
    user_id: &'a str,
    email: &'a str,
    role: Role,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match Config::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}: {e}", cli.config.display());
            return ExitCode::FAILURE;
        }
    };

    let _sentry = init_logging(config.logging.as_ref());
    if let Some(metrics) = &config.metrics {
        if let Err(e) = init_metrics(metrics) {
            tracing::warn!(error = %e, "Metrics disabled");
        }
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("error: could not start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    let name = cli.command.name();
    let started = Instant::now();
    let result = runtime.block_on(run(&config, cli.command));
    metrics::histogram!(COMMAND_DURATION.name, "command" => name)
        .record(started.elapsed().as_secs_f64());

    match result {
        Ok(()) => {
            metrics::counter!(COMMANDS_RUN.name, "command" => name, "outcome" => "ok").increment(1);
            ExitCode::SUCCESS
        }
        Err(e) => {
            metrics::counter!(COMMANDS_RUN.name, "command" => name, "outcome" => "error")
                .increment(1);
            tracing::error!(command = name, error = %e, "Command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: Option<&LoggingConfig>) -> Option<sentry::ClientInitGuard> {
    let guard = config
        .and_then(|logging| logging.sentry_dsn.as_deref())
        .map(|dsn| {
            sentry::init((
                dsn,
                sentry::ClientOptions {
                    release: sentry::release_name!(),
                    ..Default::default()
                },
            ))
        });

    let default_filter = config
        .and_then(|logging| logging.filter.as_deref())
        .unwrap_or(DEFAULT_LOG_FILTER);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(guard.as_ref().map(|_| sentry::integrations::tracing::layer()))
        .init();

    guard
}

fn init_metrics(config: &MetricsConfig) -> Result<(), SetupError> {
    let host = config.statsd_host.as_str();
    let recorder = metrics_exporter_statsd::StatsdBuilder::from(host, config.statsd_port)
        .build(Some(config.prefix.as_str()))
        .map_err(|e| SetupError::Metrics(e.to_string()))?;
    metrics::set_global_recorder(recorder).map_err(|e| SetupError::Metrics(e.to_string()))?;

    describe_workspace_metrics();
    Ok(())
}

async fn run(config: &Config, command: CliCommand) -> Result<(), CliError> {
    let app = App::from_config(config)?;
    let ctx = app.sessions.restore();

    match command {
        CliCommand::SignIn { email, password } => {
            let ctx = app.sessions.sign_in(&email, &password).await?;
            print_whoami(&ctx)
        }
        CliCommand::SignOut => {
            app.sessions.sign_out().await?;
            println!("signed out");
            Ok(())
        }
        CliCommand::Whoami => print_whoami(&ctx),
        command => run_screen(&app.backend, &ctx, command).await,
    }
}

async fn run_screen(
    backend: &Backend,
    ctx: &SessionContext,
    command: CliCommand,
) -> Result<(), CliError> {
    let is_teacher = ctx.role() == Some(Role::Teacher);

    match command {
        CliCommand::Teachers { subject: Some(subject) } => {
            print_view(backend.directory().teachers_by_subject(ctx, &subject).await?)
        }
        CliCommand::Teachers { subject: None } => {
            print_view(backend.directory().linked_teachers(ctx).await?)
        }
        CliCommand::ChooseTeacher { teacher_id } => {
            print_view(backend.directory().choose_teacher(ctx, &teacher_id).await?)
        }
        CliCommand::RemoveTeacher { teacher_id } => {
            print_view(backend.directory().remove_teacher(ctx, &teacher_id).await?)
        }
        CliCommand::Questions { open, linked } => {
            let questions = backend.questions();
            let view = if is_teacher {
                questions.teacher_questions(ctx, open).await?
            } else if linked {
                questions.linked_teacher_questions(ctx).await?
            } else {
                questions.my_questions(ctx).await?
            };
            print_view(view)
        }
        CliCommand::Ask { teacher_id, text } => {
            print_view(backend.questions().ask(ctx, &teacher_id, &text).await?)
        }
        CliCommand::Answer { question_id, text } => {
            print_view(backend.questions().answer(ctx, &question_id, &text).await?)
        }
        CliCommand::Notices => print_view(backend.notices().feed(ctx).await?),
        CliCommand::PostNotice { title, body } => {
            print_view(backend.notices().post(ctx, &title, &body).await?)
        }
        CliCommand::DeleteNotice { notice_id } => {
            print_view(backend.notices().delete(ctx, &notice_id).await?)
        }
        CliCommand::Homework => {
            let homework = backend.homework();
            let view = if is_teacher {
                homework.assigned_by_me(ctx).await?
            } else {
                homework.for_student(ctx).await?
            };
            print_view(view)
        }
        CliCommand::Assign {
            title,
            description,
            due,
        } => print_view(
            backend
                .homework()
                .assign(ctx, &title, &description, due.as_deref())
                .await?,
        ),
        CliCommand::Grade {
            homework_id,
            student_id,
            grade,
        } => print_view(
            backend
                .homework()
                .grade(ctx, &homework_id, &student_id, &grade)
                .await?,
        ),
        CliCommand::Materials => {
            let materials = backend.materials();
            let view = if is_teacher {
                materials.shared_by_me(ctx).await?
            } else {
                materials.for_student(ctx).await?
            };
            print_view(view)
        }
        CliCommand::Share { title, link } => {
            print_view(backend.materials().share(ctx, &title, &link).await?)
        }
        CliCommand::Feedback => print_view(backend.feedback().for_teacher(ctx).await?),
        CliCommand::LeaveFeedback {
            teacher_id,
            rating,
            comment,
        } => print_view(
            backend
                .feedback()
                .leave(ctx, &teacher_id, rating, &comment)
                .await?,
        ),
        CliCommand::SignIn { .. } | CliCommand::SignOut | CliCommand::Whoami => Ok(()),
    }
}

/// Prints rendered data as JSON. A redirect is reported on stderr and is
/// not a failure.
fn print_view<T: Serialize>(view: View<T>) -> Result<(), CliError> {
    match view {
        View::Render(data) => println!("{}", serde_json::to_string_pretty(&data)?),
        View::Redirect(reason) => eprintln!("redirect: {reason}"),
    }
    Ok(())
}

fn print_whoami(ctx: &SessionContext) -> Result<(), CliError> {
    match (ctx.user_id(), ctx.email(), ctx.role()) {
        (Some(user_id), Some(email), Some(role)) => {
            let whoami = Whoami { user_id, email, role };
            println!("{}", serde_json::to_string_pretty(&whoami)?);
        }
        _ => println!("signed out"),
    }
    Ok(())
}
