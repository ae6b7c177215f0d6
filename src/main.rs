//! Headless host: binds one image, replays gestures, renders a frame to PNG.
//!
//!   largeview huge.png --viewport 1280x800 --zoom 640,400,4 --out frame.png
//!   largeview scan.jpg --clip-percent 0.5,0.5,1,1 --scroll 200,0 --next-level

use std::fs::File;
use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use clap::{ArgAction, ArgMatches, CommandFactory, FromArgMatches, Parser};
use kurbo::{Point, Rect};
use log::{info, warn};
use simplelog::{Config, LevelFilter, WriteLogger};

use largeview::decoder;
use largeview::drawable::RasterCanvas;
use largeview::geometry::PixelRect;
use largeview::panic_handler::initialize_panic_handler;
use largeview::settings::Settings;
use largeview::viewer::{Command, ImageViewer};
use largeview::viewport::{Anchor, ScaleType};

const POLL_INTERVAL: Duration = Duration::from_millis(5);
const BACKGROUND: [u8; 4] = [0, 0, 0, 255];

#[derive(Parser, Debug)]
#[command(
    name = "largeview",
    version,
    about = "Render a frame of a large image through the tiled pan/zoom engine"
)]
struct Cli {
    /// Image to display
    image: PathBuf,

    /// Viewport size in pixels
    #[arg(long, value_name = "WxH", default_value = "1024x768", value_parser = parse_size)]
    viewport: (u32, u32),

    /// origin, fit, fit-width, fit-height or fixed
    #[arg(long, value_name = "TYPE")]
    scale_type: Option<ScaleType>,

    /// top-left, top-right, bottom-left, bottom-right or center
    #[arg(long, value_name = "ANCHOR")]
    anchor: Option<Anchor>,

    /// Explicit scale (switches to the fixed scale type)
    #[arg(long, value_name = "S")]
    scale: Option<f64>,

    /// Clip to source pixels
    #[arg(long, value_name = "x0,y0,x1,y1", value_parser = parse_quad::<i32>, conflicts_with = "clip_percent")]
    clip: Option<[i32; 4]>,

    /// Clip to fractions of the source size
    #[arg(long, value_name = "l,t,r,b", value_parser = parse_quad::<f64>)]
    clip_percent: Option<[f64; 4]>,

    /// Scroll by a view-space delta (repeatable)
    #[arg(long, value_name = "dx,dy", value_parser = parse_pair, allow_hyphen_values = true)]
    scroll: Vec<(f64, f64)>,

    /// Zoom by a factor about a view-space focal point (repeatable)
    #[arg(long, value_name = "x,y,f", value_parser = parse_triple, allow_hyphen_values = true)]
    zoom: Vec<(f64, f64, f64)>,

    /// Cycle to the next scale level (repeatable)
    #[arg(long, action = ArgAction::Append, num_args = 0, default_missing_value = "true")]
    next_level: Vec<bool>,

    /// Output PNG
    #[arg(long, value_name = "FILE", default_value = "frame.png")]
    out: PathBuf,

    /// Longest wait for tile decodes before writing the frame
    #[arg(long, value_name = "N", default_value_t = 5000)]
    wait_ms: u64,

    /// Settings file (defaults to the user config dir)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "FILE", default_value = "largeview.log")]
    log_file: PathBuf,

    /// -v for debug, -vv for trace
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, Debug)]
enum Gesture {
    Scroll(f64, f64),
    Zoom(Point, f64),
    NextLevel,
}

fn parse_size(s: &str) -> Result<(u32, u32), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got {s}"))?;
    let w = w.trim().parse::<u32>().map_err(|e| e.to_string())?;
    let h = h.trim().parse::<u32>().map_err(|e| e.to_string())?;
    if w == 0 || h == 0 {
        return Err("viewport must not be empty".to_string());
    }
    Ok((w, h))
}

fn parse_list<T: std::str::FromStr>(s: &str, n: usize) -> Result<Vec<T>, String>
where
    T::Err: std::fmt::Display,
{
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<T>().map_err(|e| format!("{v}: {e}")))
        .collect::<Result<Vec<_>, _>>()?;
    if values.len() != n {
        return Err(format!("expected {n} comma-separated values, got {s}"));
    }
    Ok(values)
}

fn parse_pair(s: &str) -> Result<(f64, f64), String> {
    let v = parse_list::<f64>(s, 2)?;
    Ok((v[0], v[1]))
}

fn parse_triple(s: &str) -> Result<(f64, f64, f64), String> {
    let v = parse_list::<f64>(s, 3)?;
    Ok((v[0], v[1], v[2]))
}

fn parse_quad<T>(s: &str) -> Result<[T; 4], String>
where
    T: std::str::FromStr + Copy,
    T::Err: std::fmt::Display,
{
    let v = parse_list::<T>(s, 4)?;
    Ok([v[0], v[1], v[2], v[3]])
}

/// Gestures in command-line order.
fn gestures(cli: &Cli, matches: &ArgMatches) -> Vec<Gesture> {
    fn indices(matches: &ArgMatches, id: &str) -> Vec<usize> {
        matches
            .indices_of(id)
            .map(Iterator::collect)
            .unwrap_or_default()
    }

    let mut ordered: Vec<(usize, Gesture)> = Vec::new();
    let scroll_at = indices(matches, "scroll");
    for (i, &(dx, dy)) in cli.scroll.iter().enumerate() {
        let at = scroll_at.get(i).copied().unwrap_or(usize::MAX);
        ordered.push((at, Gesture::Scroll(dx, dy)));
    }
    let zoom_at = indices(matches, "zoom");
    for (i, &(x, y, f)) in cli.zoom.iter().enumerate() {
        let at = zoom_at.get(i).copied().unwrap_or(usize::MAX);
        ordered.push((at, Gesture::Zoom(Point::new(x, y), f)));
    }
    let next_at = indices(matches, "next_level");
    for i in 0..cli.next_level.len() {
        let at = next_at.get(i).copied().unwrap_or(usize::MAX);
        ordered.push((at, Gesture::NextLevel));
    }

    // Stable, so gestures without a recorded index keep their group order.
    ordered.sort_by_key(|(at, _)| *at);
    ordered.into_iter().map(|(_, g)| g).collect()
}

fn init_logging(cli: &Cli) -> Result<()> {
    let level = match cli.verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    let file = File::create(&cli.log_file)
        .with_context(|| format!("Failed to create log file {:?}", cli.log_file))?;
    WriteLogger::init(level, Config::default(), file).context("Failed to install logger")?;
    Ok(())
}

fn main() -> Result<()> {
    let matches = Cli::command().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    init_logging(&cli)?;
    initialize_panic_handler();

    info!("Starting largeview on {:?}", cli.image);

    let settings = match &cli.config {
        Some(path) => Settings::load_from_path(path),
        None => Settings::load(),
    };
    let mut config = settings.viewer_config();
    if let Some(scale_type) = cli.scale_type {
        config.scale_type = scale_type;
    }
    if let Some(anchor) = cli.anchor {
        config.anchor = anchor;
    }

    let source = decoder::open_path(&cli.image, settings.preview_max_dimension)
        .with_context(|| format!("Failed to open {:?}", cli.image))?;

    let (width, height) = cli.viewport;
    let mut viewer = ImageViewer::new(config);
    viewer.apply(Command::SetBounds(Rect::new(
        0.0,
        0.0,
        f64::from(width),
        f64::from(height),
    )));
    viewer.bind(source);

    if let Some([x0, y0, x1, y1]) = cli.clip {
        viewer.apply(Command::SetClipRect(PixelRect::new(x0, y0, x1, y1)));
    } else if let Some([l, t, r, b]) = cli.clip_percent {
        viewer.apply(Command::SetClipPercent(Rect::new(l, t, r, b)));
    }
    if let Some(scale) = cli.scale {
        if !(scale.is_finite() && scale > 0.0) {
            bail!("--scale must be a positive number, got {scale}");
        }
        viewer.apply(Command::SetScale(scale));
    }

    for gesture in gestures(&cli, &matches) {
        match gesture {
            Gesture::Scroll(dx, dy) => {
                let rest = viewer.scroll(dx, dy);
                info!("Scroll ({dx}, {dy}), unconsumed ({}, {})", rest.x, rest.y);
            }
            Gesture::Zoom(focal, factor) => {
                let rest = viewer.scale_at(focal, factor);
                info!("Zoom x{factor} at {focal:?}, unconsumed x{rest}");
            }
            Gesture::NextLevel => {
                let scale = viewer.zoom_to_next_level();
                info!("Next scale level {scale}");
            }
        }
    }

    let mut canvas = RasterCanvas::filled(width, height, BACKGROUND);
    let deadline = Instant::now() + Duration::from_millis(cli.wait_ms);
    let mut frames = 0u32;
    loop {
        viewer.poll();
        canvas.clear(BACKGROUND);
        viewer.draw(&mut canvas);
        frames += 1;

        if !viewer.is_loading() {
            break;
        }
        if Instant::now() >= deadline {
            warn!("Tile decodes still pending after {} ms", cli.wait_ms);
            break;
        }
        thread::sleep(POLL_INTERVAL);
    }

    canvas
        .save_png(&cli.out)
        .with_context(|| format!("Failed to write {:?}", cli.out))?;
    info!("Wrote {:?} after {frames} frame(s)", cli.out);

    println!("{}", viewer.viewport().debug_info());
    if let Some(stats) = viewer.tile_stats() {
        println!("{stats}");
    }
    println!("frame: {} ({frames} passes)", cli.out.display());

    info!("Shutting down largeview");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_argument_shapes() {
        assert_eq!(parse_size("640x480"), Ok((640, 480)));
        assert!(parse_size("640").is_err());
        assert!(parse_size("0x10").is_err());
        assert_eq!(parse_pair("-10,2.5"), Ok((-10.0, 2.5)));
        assert_eq!(parse_quad::<i32>("1,2,3,4"), Ok([1, 2, 3, 4]));
        assert!(parse_triple("1,2").is_err());
    }

    #[test]
    fn gestures_keep_command_line_order() {
        let matches = Cli::command()
            .try_get_matches_from([
                "largeview",
                "a.png",
                "--zoom",
                "10,10,2",
                "--scroll",
                "5,5",
                "--next-level",
                "--zoom",
                "0,0,0.5",
            ])
            .expect("parses");
        let cli = Cli::from_arg_matches(&matches).expect("valid");
        let order: Vec<&str> = gestures(&cli, &matches)
            .iter()
            .map(|g| match g {
                Gesture::Scroll(..) => "scroll",
                Gesture::Zoom(..) => "zoom",
                Gesture::NextLevel => "next",
            })
            .collect();
        assert_eq!(order, vec!["zoom", "scroll", "next", "zoom"]);
    }

    #[test]
    fn clip_modes_conflict() {
        let result = Cli::command().try_get_matches_from([
            "largeview",
            "a.png",
            "--clip",
            "0,0,1,1",
            "--clip-percent",
            "0,0,1,1",
        ]);
        assert!(result.is_err());
    }
}
