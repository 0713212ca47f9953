use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;

use diptych::{CssRect, ImageSource, Session, SessionOpts, Side};

#[derive(Parser, Debug)]
#[command(
    name = "diptych",
    version,
    about = "Composite a before/after image pair side by side and write a PNG"
)]
struct Cli {
    /// Left ("before") image path.
    #[arg(long)]
    before: PathBuf,

    /// Right ("after") image path.
    #[arg(long)]
    after: PathBuf,

    /// Label drawn over the before half.
    #[arg(long, default_value = "before")]
    before_label: String,

    /// Label drawn over the after half.
    #[arg(long, default_value = "after")]
    after_label: String,

    /// Output file name (".png" is appended).
    #[arg(long, default_value = "before-v-after")]
    name: String,

    /// Canvas width in CSS pixels.
    #[arg(long, default_value_t = 800.0)]
    width: f64,

    /// Canvas height in CSS pixels.
    #[arg(long, default_value_t = 450.0)]
    height: f64,

    /// Device pixel ratio applied to the canvas.
    #[arg(long)]
    device_pixel_ratio: Option<f64>,

    /// Extra directory scanned for label fonts.
    #[arg(long)]
    fonts_dir: Option<PathBuf>,

    /// Output directory.
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    // All compositing runs on one thread; decodes and debounce timers are
    // local tasks, never worker threads.
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build tokio runtime")?;
    let local = tokio::task::LocalSet::new();
    rt.block_on(local.run_until(run(cli)))
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let session = Session::new(SessionOpts {
        device_pixel_ratio: cli.device_pixel_ratio,
        fonts_dir: cli.fonts_dir.clone(),
        viewport: Some(CssRect::new(cli.width, cli.height)),
        ..SessionOpts::default()
    })?;

    session.set_file_name(cli.name.as_str());
    session.set_text(Side::Before, cli.before_label.as_str());
    session.set_text(Side::After, cli.after_label.as_str());
    session.set_image(Side::Before, vec![ImageSource::path(&cli.before)])?;
    session.set_image(Side::After, vec![ImageSource::path(&cli.after)])?;
    session.flush().await;

    let png = session.export_png()?;

    std::fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("create output dir '{}'", cli.out_dir.display()))?;
    let out_path = cli.out_dir.join(session.export_file_name());
    std::fs::write(&out_path, png)
        .with_context(|| format!("write png '{}'", out_path.display()))?;

    eprintln!("wrote {}", out_path.display());
    Ok(())
}
