use gitrail_core::{collect_commits, collect_refs, open_repository, reflog, resolve_git_dir};
use gitrail_render::{html, locations, svg};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug)]
enum CliError {
    Usage(&'static str),
    Core(gitrail_core::Error),
    Render(gitrail_render::Error),
    Io(std::io::Error),
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Usage(msg) => write!(f, "{msg}"),
            CliError::Core(err) => write!(f, "{err}"),
            CliError::Render(err) => write!(f, "{err}"),
            CliError::Io(err) => write!(f, "I/O error: {err}"),
        }
    }
}

impl From<gitrail_core::Error> for CliError {
    fn from(value: gitrail_core::Error) -> Self {
        Self::Core(value)
    }
}

impl From<gitrail_render::Error> for CliError {
    fn from(value: gitrail_render::Error) -> Self {
        Self::Render(value)
    }
}

impl From<std::io::Error> for CliError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

#[derive(Debug)]
struct Args {
    path: PathBuf,
    all: bool,
    locations: PathBuf,
    no_svg: bool,
    html: Option<PathBuf>,
    html_only: bool,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            path: PathBuf::from("."),
            all: false,
            locations: PathBuf::from("locations.json"),
            no_svg: false,
            html: None,
            html_only: false,
        }
    }
}

fn usage() -> &'static str {
    "gitrail\n\
\n\
Render a railway diagram of a git repository's commit graph.\n\
\n\
USAGE:\n\
  gitrail [--path <dir>] [--all] [--locations <file>] [--no-svg] [--html <file>] [--html-only]\n\
\n\
OPTIONS:\n\
  --path <dir>        Repository root or any subdirectory (default: .)\n\
  --all               Include remote refs in the walk and labeling\n\
  --locations <file>  Write lattice positions JSON here (default: locations.json)\n\
  --no-svg            Do not emit SVG on stdout\n\
  --html <file>       Write a self-contained HTML page here\n\
  --html-only         With --html, suppress the stdout SVG\n\
"
}

fn parse_args(argv: &[String]) -> Result<Args, CliError> {
    let mut args = Args::default();

    let mut it = argv.iter().skip(1);
    while let Some(a) = it.next() {
        match a.as_str() {
            "--help" | "-h" => return Err(CliError::Usage(usage())),
            "--all" => args.all = true,
            "--no-svg" => args.no_svg = true,
            "--html-only" => args.html_only = true,
            "--path" => {
                let Some(path) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.path = PathBuf::from(path);
            }
            "--locations" => {
                let Some(path) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.locations = PathBuf::from(path);
            }
            "--html" => {
                let Some(path) = it.next() else {
                    return Err(CliError::Usage(usage()));
                };
                args.html = Some(PathBuf::from(path));
            }
            _ => return Err(CliError::Usage(usage())),
        }
    }

    Ok(args)
}

fn page_title(path: &Path) -> String {
    path.canonicalize()
        .ok()
        .as_deref()
        .unwrap_or(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "railway".to_string())
}

fn run(args: Args) -> Result<(), CliError> {
    let repo = open_repository(&args.path)?;
    let (commits, children) = collect_commits(&args.path, &repo, args.all)?;
    let refs = collect_refs(&repo, args.all)?;

    let layout = gitrail_render::arrange(&commits, &children, &refs.heads);
    if let Err(err) = locations::write_file(&layout, &args.locations) {
        warn!(
            path = %args.locations.display(),
            error = %err,
            "could not save locations"
        );
    } else {
        info!("wrote {}", args.locations.display());
    }

    let suppress_stdout = args.no_svg || (args.html_only && args.html.is_some());
    let svg_needed = !suppress_stdout || args.html.is_some();
    let svg_text = if svg_needed {
        svg::render_railway(&commits, &layout, &refs.heads, &refs.tags, &children)
    } else {
        String::new()
    };

    if !suppress_stdout {
        let mut stdout = std::io::stdout().lock();
        stdout.write_all(svg_text.as_bytes())?;
    }

    if let Some(html_path) = &args.html {
        let slug = resolve_git_dir(&args.path)
            .ok()
            .and_then(|git_dir| reflog::github_slug(&git_dir));
        let data = html::generate_commit_data(&commits, slug.as_deref());
        let mut file = std::fs::File::create(html_path)?;
        html::write_html(&mut file, &svg_text, &data, &page_title(&args.path))?;
        info!("wrote {}", html_path.display());
    }

    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = match parse_args(&std::env::args().collect::<Vec<_>>()) {
        Ok(args) => args,
        Err(CliError::Usage(msg)) => {
            eprintln!("{msg}");
            std::process::exit(2);
        }
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };

    if let Err(err) = run(args) {
        eprintln!("{err}");
        std::process::exit(1);
    }
}
