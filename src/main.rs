mod cli;
mod compiler;
mod core;

use anyhow::{Context, Result};
use cli::commands::{CompileCommand, InspectCommand, RequestArgs, ValidateCommand};
use cli::output::*;
use cli::{Cli, Command};
use compiler::{aggregate, compile, inject_custom, plan_stages, select_actions, synthesize};
use crate::core::{
    load_policies, CompilationRequest, GitRef, NamespacePolicies, PipelineConfig, PipelineSource,
    Policy, ScanType, StaticProfileResolver,
};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Compile(cmd) => run_compile(cmd)?,
        Command::Validate(cmd) => run_validate(cmd)?,
        Command::Inspect(cmd) => run_inspect(cmd)?,
    }

    Ok(())
}

fn run_compile(cmd: &CompileCommand) -> Result<()> {
    let base = PipelineConfig::from_file(&cmd.file)
        .with_context(|| format!("Failed to load base configuration from {}", cmd.file))?;

    let policies = gather_policies(&cmd.request)?;
    println!(
        "{} Loaded {} policies for ref {}",
        INFO,
        style(policies.len()).cyan(),
        style(&cmd.request.git_ref).bold()
    );

    let resolver = build_resolver(&cmd.request);
    let request = CompilationRequest {
        base_config: base,
        git_ref: build_git_ref(&cmd.request),
        source: PipelineSource::from(cmd.request.source),
        policies,
        custom_ci_enabled: cmd.request.custom_ci,
        profiles: &resolver,
    };

    let output = compile(&request).context("Compilation failed")?;

    let rendered = if cmd.json {
        serde_json::to_string_pretty(output.as_mapping())?
    } else {
        output.to_yaml()?
    };

    match &cmd.output {
        Some(path) => {
            std::fs::write(path, &rendered)
                .with_context(|| format!("Failed to write {}", path))?;
            println!(
                "{} Merged configuration written to {}",
                CHECK,
                style(path).bold()
            );
        }
        None => println!("{}", rendered),
    }

    Ok(())
}

fn run_validate(cmd: &ValidateCommand) -> Result<()> {
    let policies = load_policies(&cmd.file)
        .with_context(|| format!("Failed to load policies from {}", cmd.file))?;

    let mut failures = 0usize;
    let mut report = Vec::new();

    for policy in &policies {
        let name = if policy.name.is_empty() {
            "(unnamed)"
        } else {
            &policy.name
        };
        match policy.validate() {
            Ok(()) => {
                println!("{} {}", CHECK, format_policy_summary(policy));
                report.push(serde_json::json!({ "policy": name, "valid": true }));
            }
            Err(error) => {
                failures += 1;
                println!("{} {}: {}", CROSS, style(name).bold(), style(&error).red());
                report.push(serde_json::json!({
                    "policy": name,
                    "valid": false,
                    "error": error.to_string(),
                }));
            }
        }
    }

    if cmd.json {
        let data = serde_json::json!({ "policies": report });
        println!("\n{}", serde_json::to_string_pretty(&data)?);
    }

    if failures > 0 {
        println!(
            "{} {} of {} policies failed validation",
            WARN,
            style(failures).red(),
            policies.len()
        );
        std::process::exit(1);
    }

    println!("{} All {} policies are valid", CHECK, policies.len());
    Ok(())
}

fn run_inspect(cmd: &InspectCommand) -> Result<()> {
    let base = match &cmd.file {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("Failed to load base configuration from {}", path))?,
        None => PipelineConfig::new(),
    };

    let policies = gather_policies(&cmd.request)?;
    let git_ref = build_git_ref(&cmd.request);
    let source = PipelineSource::from(cmd.request.source);

    let selected = select_actions(&policies, &git_ref, source);
    if selected.is_empty() {
        println!(
            "{} No policies apply to {} ({:?})",
            INFO,
            style(&git_ref.name).bold(),
            source
        );
        return Ok(());
    }

    println!("{} Applicable actions:", INFO);
    for action in &selected {
        let policy = &policies[action.policy_index];
        println!(
            "  {} <- {}",
            format_action(&action.action),
            format_policy_summary(policy)
        );
    }

    let injection = inject_custom(&selected, &base, cmd.request.custom_ci);
    let has_scan = selected.iter().any(|s| s.action.scan_type().is_some());
    let has_dast = selected
        .iter()
        .any(|s| s.action.scan_type() == Some(ScanType::Dast));
    let plan = plan_stages(
        &base.stages().unwrap_or_default(),
        has_scan,
        has_dast,
        injection.active(),
    );

    println!("{} Planned stages: {}", INFO, plan.stages.join(", "));

    let resolver = build_resolver(&cmd.request);
    let jobs = synthesize(&selected, &plan, &base, &resolver);
    for (name, _) in &jobs {
        println!("  {} {}", CHECK, style(name).cyan());
    }
    for (name, _) in &injection.jobs {
        println!("  {} {} (custom)", CHECK, style(name).cyan());
    }
    for name in &injection.deletions {
        println!("  {} {} (evicted from reserved stage)", CROSS, style(name).dim());
    }

    Ok(())
}

/// Load and aggregate policies per the request flags
fn gather_policies(args: &RequestArgs) -> Result<Vec<Policy>> {
    let mut project = Vec::new();
    for path in &args.policy {
        let policies =
            load_policies(path).with_context(|| format!("Failed to load policies from {}", path))?;
        project.extend(policies);
    }

    let mut chain = Vec::new();
    for (origin, path) in &args.namespace {
        let policies =
            load_policies(path).with_context(|| format!("Failed to load policies from {}", path))?;
        chain.push(NamespacePolicies::new(origin, policies));
    }
    for origin in &args.disabled_namespace {
        chain.push(NamespacePolicies::disabled(origin));
    }

    Ok(aggregate(project, chain))
}

fn build_git_ref(args: &RequestArgs) -> GitRef {
    let mut git_ref = if args.tag {
        GitRef::tag(&args.git_ref)
    } else {
        GitRef::branch(&args.git_ref)
    };
    if args.default_branch {
        git_ref = git_ref.with_default();
    }
    if args.protected {
        git_ref = git_ref.with_protected();
    }
    git_ref
}

fn build_resolver(args: &RequestArgs) -> StaticProfileResolver {
    let mut resolver = StaticProfileResolver::new();
    for site in &args.site_profile {
        resolver = resolver.with_site(site);
    }
    for scanner in &args.scanner_profile {
        resolver = resolver.with_scanner(scanner);
    }
    resolver
}
