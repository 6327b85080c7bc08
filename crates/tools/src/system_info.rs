use async_trait::async_trait;
use serde_json::{json, Value};
use uranus_core::Result;

use crate::{ParamSpec, Tool, ToolContext, ToolSchema, Trigger};

const INFO_TYPES: &[&str] = &["all", "cpu", "memory", "disk", "platform"];

/// `system_info`: reports platform, CPU, memory and disk facts about the host.
pub struct SystemInfoTool;

#[async_trait]
impl Tool for SystemInfoTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "system_info",
            description: "Get information about the system status such as cpu memory disk usage and platform",
            parameters: vec![ParamSpec::string("info_type")
                .choices(INFO_TYPES)
                .default_value(json!("all"))
                .describe("Category to report: all, cpu, memory, disk, platform")],
            triggers: vec![
                Trigger::new("system information"),
                Trigger::new("system status"),
                Trigger::new("system info"),
                Trigger::new("sysinfo"),
            ],
        }
    }

    async fn execute(&self, _ctx: ToolContext, params: Value) -> Result<Value> {
        let info_type = params
            .get("info_type")
            .and_then(|v| v.as_str())
            .unwrap_or("all");
        let wants = |section: &str| info_type == "all" || info_type == section;

        let mut result = json!({});
        if wants("platform") {
            result["platform"] = detect_platform().await;
        }
        if wants("cpu") {
            result["cpu"] = detect_cpu().await;
        }
        if wants("memory") {
            result["memory"] = detect_memory().await;
        }
        if wants("disk") {
            result["disk"] = detect_disk().await;
        }
        Ok(result)
    }
}

async fn detect_platform() -> Value {
    let mut platform = json!({
        "os": std::env::consts::OS,
        "arch": std::env::consts::ARCH,
        "family": std::env::consts::FAMILY,
    });
    if let Some(release) = run_command("uname", &["-r"]).await {
        platform["release"] = json!(release.trim());
    }
    if let Some(host) = run_command("hostname", &[]).await {
        platform["hostname"] = json!(host.trim());
    }
    platform
}

async fn detect_cpu() -> Value {
    let mut cpu = json!({
        "logical_cores": std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
    });
    if let Ok(loadavg) = tokio::fs::read_to_string("/proc/loadavg").await {
        let loads: Vec<f64> = loadavg
            .split_whitespace()
            .take(3)
            .filter_map(|s| s.parse().ok())
            .collect();
        if loads.len() == 3 {
            cpu["load_average"] = json!(loads);
        }
    } else if let Some(out) = run_command("sysctl", &["-n", "vm.loadavg"]).await {
        cpu["load_average"] = json!(out.trim().trim_matches(|c| c == '{' || c == '}').trim());
    }
    cpu
}

async fn detect_memory() -> Value {
    if let Ok(meminfo) = tokio::fs::read_to_string("/proc/meminfo").await {
        return parse_meminfo(&meminfo);
    }
    if let Some(out) = run_command("sysctl", &["-n", "hw.memsize"]).await {
        if let Ok(bytes) = out.trim().parse::<u64>() {
            return json!({ "total": bytes });
        }
    }
    json!({ "available": false })
}

/// Extract totals from `/proc/meminfo`; values there are in KiB.
fn parse_meminfo(meminfo: &str) -> Value {
    let field = |name: &str| -> Option<u64> {
        meminfo
            .lines()
            .find(|l| l.starts_with(name))
            .and_then(|l| l.split_whitespace().nth(1))
            .and_then(|v| v.parse::<u64>().ok())
            .map(|kib| kib * 1024)
    };
    let total = field("MemTotal:");
    let available = field("MemAvailable:");
    let mut mem = json!({ "total": total, "available": available });
    if let (Some(total), Some(available)) = (total, available) {
        if total > 0 {
            let used = total.saturating_sub(available);
            mem["used"] = json!(used);
            mem["percent"] = json!(((used as f64 / total as f64) * 1000.0).round() / 10.0);
        }
    }
    mem
}

async fn detect_disk() -> Value {
    match run_command("df", &["-k", "/"]).await {
        Some(out) => parse_df(&out).unwrap_or_else(|| json!({ "raw": out.trim() })),
        None => json!({ "available": false }),
    }
}

/// Parse the data row of `df -k`: filesystem, blocks, used, available, capacity.
fn parse_df(output: &str) -> Option<Value> {
    let row = output.lines().nth(1)?;
    let cols: Vec<&str> = row.split_whitespace().collect();
    let kib = |i: usize| cols.get(i).and_then(|v| v.parse::<u64>().ok()).map(|v| v * 1024);
    Some(json!({
        "total": kib(1)?,
        "used": kib(2)?,
        "free": kib(3)?,
        "percent": cols.get(4).map(|p| p.trim_end_matches('%')).and_then(|p| p.parse::<f64>().ok()),
    }))
}

async fn run_command(cmd: &str, args: &[&str]) -> Option<String> {
    let output = tokio::process::Command::new(cmd)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).to_string())
}
