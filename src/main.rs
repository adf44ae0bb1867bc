// SPDX-License-Identifier: GPL-3.0-only

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};

use ddcutil_adapter::{
    Config, Criterion, Ddcutil, DisplayHandle, FeatureCode, FeatureFlags, MccsVersionId, MccsVersionSpec, VcpValue,
};

#[macro_use]
extern crate tracing;

#[derive(Parser)]
#[command(name = "ddca", version, about = "Query and change monitor settings over DDC/CI")]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

/// Which monitor to talk to
#[derive(Args, Clone, Copy)]
struct Target {
    /// Display number as reported by `detect`
    #[arg(short, long, default_value_t = 1, conflicts_with = "bus")]
    display: i32,
    /// I2C bus number, /dev/i2c-N
    #[arg(short, long)]
    bus: Option<i32>,
}

impl Target {
    fn criterion(self) -> Criterion {
        match self.bus {
            Some(busno) => Criterion::BusNumber(busno),
            None => Criterion::DisplayNumber(self.display),
        }
    }
}

#[derive(Subcommand)]
enum Cmd {
    /// Print library version and build options
    Version,
    /// List detected monitors
    Detect,
    /// Read a feature value
    Getvcp {
        #[arg(value_parser = parse_feature_code)]
        code: FeatureCode,
        #[command(flatten)]
        target: Target,
    },
    /// Write a feature value
    Setvcp {
        #[arg(value_parser = parse_feature_code)]
        code: FeatureCode,
        value: u16,
        #[command(flatten)]
        target: Target,
    },
    /// Show the monitor's capabilities
    Capabilities {
        #[command(flatten)]
        target: Target,
    },
    /// Describe a feature code
    Vcpinfo {
        #[arg(value_parser = parse_feature_code)]
        code: FeatureCode,
        /// MCCS version, e.g. 2.1
        #[arg(long, value_parser = parse_mccs_version)]
        mccs: Option<MccsVersionId>,
    },
    /// Print the values that make up the monitor's color profile
    Dumpvcp {
        #[command(flatten)]
        target: Target,
    },
    /// Restore values printed by `dumpvcp`
    Loadvcp { values: String },
}

/// Feature codes are hex with a `0x` prefix or `h` suffix, decimal otherwise
fn parse_feature_code(s: &str) -> Result<FeatureCode, String> {
    let s = s.trim();
    let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u8::from_str_radix(hex, 16)
    } else if let Some(hex) = s.strip_suffix('h').or_else(|| s.strip_suffix('H')) {
        u8::from_str_radix(hex, 16)
    } else {
        s.parse()
    };
    parsed.map_err(|e| format!("invalid feature code '{s}': {e}"))
}

fn parse_mccs_version(s: &str) -> Result<MccsVersionId, String> {
    let (major, minor) = s.split_once('.').ok_or_else(|| format!("expected major.minor, got '{s}'"))?;
    let spec = MccsVersionSpec::new(
        major.parse().map_err(|_| format!("invalid major version '{major}'"))?,
        minor.parse().map_err(|_| format!("invalid minor version '{minor}'"))?,
    );
    match MccsVersionId::from_spec(spec) {
        MccsVersionId::Any => Err(format!("unknown MCCS version {spec}")),
        id => Ok(id),
    }
}

fn setup_logs() {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let fmt_layer = fmt::layer().with_target(false);
    let filter_layer = EnvFilter::try_from_default_env().unwrap_or(EnvFilter::new(format!(
        "warn,{}=warn,ddcutil_adapter=warn",
        env!("CARGO_CRATE_NAME")
    )));

    if let Ok(journal_layer) = tracing_journald::layer() {
        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .with(journal_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter_layer)
            .with(fmt_layer)
            .init();
    }
}

fn main() -> anyhow::Result<()> {
    setup_logs();
    let cli = Cli::parse();

    let lib = Ddcutil::load().context("loading libddcutil")?;
    let config = Config::load().context("reading configuration")?;
    config.apply(&lib).context("applying configuration")?;

    match cli.command {
        Cmd::Version => version(&lib),
        Cmd::Detect => detect(&lib),
        Cmd::Getvcp { code, target } => {
            let line = lib.with_display(&target.criterion(), |dh| getvcp(dh, code))?;
            println!("{line}");
            Ok(())
        }
        Cmd::Setvcp { code, value, target } => {
            lib.with_display(&target.criterion(), |dh| setvcp(dh, code, value))
                .with_context(|| format!("setting feature 0x{code:02x} to {value}"))?;
            Ok(())
        }
        Cmd::Capabilities { target } => {
            let report = lib.with_display(&target.criterion(), |dh| capabilities(&lib, dh))?;
            print!("{report}");
            Ok(())
        }
        Cmd::Vcpinfo { code, mccs } => vcpinfo(&lib, code, mccs.unwrap_or(MccsVersionId::Any)),
        Cmd::Dumpvcp { target } => {
            let values = lib.with_display(&target.criterion(), |dh| dh.profile_related_values())?;
            println!("{values}");
            Ok(())
        }
        Cmd::Loadvcp { values } => {
            lib.set_profile_related_values(&values).context("restoring profile values")?;
            Ok(())
        }
    }
}

fn version(lib: &Ddcutil) -> anyhow::Result<()> {
    let info = lib.info()?;
    match &info.version_string {
        Some(full) => println!("libddcutil {} ({full})", info.version),
        None => println!("libddcutil {}", info.version),
    }
    println!("build options: {:?}", info.build_options);
    println!("max tries limit: {}", info.max_max_tries);
    Ok(())
}

fn detect(lib: &Ddcutil) -> anyhow::Result<()> {
    let displays = lib.displays().context("enumerating displays")?;
    if displays.is_empty() {
        println!("No displays found");
        return Ok(());
    }

    for display in displays {
        if display.dispno < 0 {
            println!("Invalid display");
        } else {
            println!("Display {}", display.dispno);
        }
        println!("   I/O path:  {}", display.path);
        println!("   Mfg id:    {}", display.mfg_id.as_deref().unwrap_or(""));
        println!("   Model:     {}", display.model_name.as_deref().unwrap_or(""));
        println!("   Serial:    {}", display.serial.as_deref().unwrap_or(""));
        println!();
    }
    Ok(())
}

fn getvcp(dh: &mut DisplayHandle, code: FeatureCode) -> ddcutil_adapter::Result<String> {
    let info = dh.feature_info(code)?;
    let name = info.name.as_deref().unwrap_or("Unknown feature");
    if info.flags.is_table() {
        let value = dh.vcp_value(code)?;
        let bytes = match &value.value {
            VcpValue::Table(bytes) => bytes.iter().map(|b| format!("{b:02x}")).collect::<Vec<_>>().join(" "),
            VcpValue::NonTable(v) => format!("{v:?}"),
        };
        return Ok(format!("VCP code 0x{code:02x} ({name}): {bytes}"));
    }
    let formatted = dh.formatted_vcp_value(code)?;
    Ok(format!("VCP code 0x{code:02x} ({name}): {formatted}"))
}

fn setvcp(dh: &mut DisplayHandle, code: FeatureCode, value: u16) -> ddcutil_adapter::Result<()> {
    let info = dh.feature_info(code)?;
    if !info.flags.is_writable() {
        return Err(ddcutil_adapter::Error::InvalidArgument(format!(
            "feature 0x{code:02x} is not writable"
        )));
    }
    if info.flags.contains(FeatureFlags::SIMPLE_NC) {
        let sl = u8::try_from(value).map_err(|_| {
            ddcutil_adapter::Error::InvalidArgument(format!("{value} does not fit a non-continuous value"))
        })?;
        debug!("setting simple NC feature 0x{:02x} to 0x{:02x}", code, sl);
        dh.set_simple_nc_value(code, sl)
    } else {
        dh.set_vcp_value(code, value)
    }
}

/// One declared feature with the names its values resolve to
struct ReportFeature {
    code: FeatureCode,
    name: Option<String>,
    values: Vec<(u8, Option<String>)>,
}

fn capabilities(lib: &Ddcutil, dh: &mut DisplayHandle) -> ddcutil_adapter::Result<String> {
    let parsed = dh.capabilities()?;
    let version = parsed.mccs_version()?;
    let mut features = Vec::new();
    for feature in parsed.features()? {
        let values = feature
            .values
            .iter()
            .map(|&value| match dh.simple_nc_value_name(feature.code, value) {
                Ok(value_name) => (value, Some(value_name)),
                Err(e) => {
                    debug!("no name for 0x{:02x}/0x{:02x}: {}", feature.code, value, e);
                    (value, None)
                }
            })
            .collect();
        features.push(ReportFeature {
            code: feature.code,
            name: lib.feature_name(feature.code)?,
            values,
        });
    }
    parsed.release()?;
    Ok(capabilities_report(version, &features))
}

fn capabilities_report(version: MccsVersionSpec, features: &[ReportFeature]) -> String {
    let mut lines = vec![format!("MCCS version: {version}"), "VCP features:".to_string()];
    for feature in features {
        lines.push(format!(
            "   Feature: {:02X} ({})",
            feature.code,
            feature.name.as_deref().unwrap_or("Unknown feature")
        ));
        for (value, value_name) in &feature.values {
            lines.push(format!(
                "      {value:02x}: {}",
                value_name.as_deref().unwrap_or("Unrecognized value")
            ));
        }
    }
    lines.join("\n") + "\n"
}

fn vcpinfo(lib: &Ddcutil, code: FeatureCode, version: MccsVersionId) -> anyhow::Result<()> {
    let info = lib
        .feature_info(code, version)
        .with_context(|| format!("looking up feature 0x{code:02x}"))?;
    if info.flags.is_empty() {
        bail!("feature 0x{code:02x} has no attributes for {version:?}");
    }

    println!("VCP code {:02X}: {}", info.code, info.name.as_deref().unwrap_or(""));
    println!("   {}", info.description.as_deref().unwrap_or(""));
    println!("   MCCS version: {}", info.version);
    println!("   Attributes: {:?}", info.flags);
    if let Some(values) = info.values {
        println!("   Simple NC values:");
        for (value, name) in values.iter() {
            println!("      {value:02x}: {name}");
        }
    }
    Ok(())
}
