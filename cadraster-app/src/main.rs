use std::path::PathBuf;

use cadraster_config::{AppConfig, ConfigError};
use cadraster_render::Renderer;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt};

mod demo;
mod input;

/// 命令行覆盖项，未给出的选项沿用配置文件。
#[derive(Debug, Default)]
struct CliOverrides {
    config: Option<PathBuf>,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    font: Option<PathBuf>,
    parallel: bool,
    keep_colors: bool,
    crop: bool,
    hatch: bool,
}

fn main() {
    let overrides = parse_args();
    let mut config = load_configuration(overrides.config.clone());
    init_logging(&config);
    info!("启动 CAD 光栅化工具");
    apply_overrides(&mut config, &overrides);

    let document = match &overrides.input {
        Some(path) => match input::load_document(path) {
            Ok(document) => document,
            Err(err) => {
                error!(error = %err, "无法加载输入文档");
                std::process::exit(1);
            }
        },
        None => {
            info!("未指定输入文档，使用内置示例");
            demo::demo_document()
        }
    };

    let mut renderer = Renderer::new(document, config.render.clone()).with_parallel(config.output.parallel);
    if let Some(font) = &config.output.font_path {
        renderer = renderer.with_font_path(font);
    }

    match renderer.render_to_png(&config.output.path) {
        Ok(summary) => {
            info!(
                path = %config.output.path.display(),
                drawn = summary.drawn,
                skipped = summary.skipped,
                "已写出图像"
            );
            println!("{}", config.output.path.display());
        }
        Err(err) => {
            error!(path = %config.output.path.display(), error = %err, "渲染失败");
            std::process::exit(1);
        }
    }
}

fn parse_args() -> CliOverrides {
    let mut args = std::env::args().skip(1);
    let mut overrides = CliOverrides::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => overrides.config = Some(path_arg(&mut args, "--config")),
            "--input" => overrides.input = Some(path_arg(&mut args, "--input")),
            "--output" => overrides.output = Some(path_arg(&mut args, "--output")),
            "--font" => overrides.font = Some(path_arg(&mut args, "--font")),
            "--parallel" => overrides.parallel = true,
            "--keep-colors" => overrides.keep_colors = true,
            "--crop" => overrides.crop = true,
            "--hatch" => overrides.hatch = true,
            other => {
                eprintln!("未知参数：{other}");
                std::process::exit(1);
            }
        }
    }
    overrides
}

fn path_arg(args: &mut impl Iterator<Item = String>, flag: &str) -> PathBuf {
    let Some(path) = args.next() else {
        eprintln!("`{flag}` 需要提供路径");
        std::process::exit(1);
    };
    PathBuf::from(path)
}

fn apply_overrides(config: &mut AppConfig, overrides: &CliOverrides) {
    if let Some(output) = &overrides.output {
        config.output.path = output.clone();
    }
    if let Some(font) = &overrides.font {
        config.output.font_path = Some(font.clone());
    }
    config.output.parallel |= overrides.parallel;
    config.render.keep_original_colors |= overrides.keep_colors;
    config.render.crop_empty_edges |= overrides.crop;
    config.render.draw_hatch |= overrides.hatch;
}

fn load_configuration(override_path: Option<PathBuf>) -> AppConfig {
    match override_path {
        Some(path) => AppConfig::from_file(&path).unwrap_or_else(|err| {
            warn!(path = %path.display(), error = %err, "加载指定配置失败，使用默认配置");
            AppConfig::default()
        }),
        None => match AppConfig::discover() {
            Ok(cfg) => cfg,
            Err(err) => {
                match &err {
                    ConfigError::Io { path, .. } | ConfigError::Parse { path, .. } => {
                        warn!(path = %path.display(), error = %err, "加载默认配置失败，使用内建默认值");
                    }
                    ConfigError::Context { .. } => {
                        warn!(error = %err, "加载默认配置失败，使用内建默认值");
                    }
                }
                AppConfig::default()
            }
        },
    }
}

fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    // 重复初始化时忽略
    let _ = fmt().with_env_filter(filter).try_init();
}
