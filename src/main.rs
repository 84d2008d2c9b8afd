// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Scenepatch-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Scenepatch and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Scenepatch CLI entrypoint.
//!
//! By default this serves MCP over streamable HTTP at `http://127.0.0.1:<port>/mcp`.
//!
//! Use `--mcp` to run the MCP server over stdio instead (intended for tool integrations).
//! Logs go to stderr; `RUST_LOG` overrides the default `info` filter.

use std::error::Error;
use std::sync::Arc;

use axum::Router;
use rmcp::transport::{
    streamable_http_server::session::local::LocalSessionManager, StreamableHttpServerConfig,
    StreamableHttpService,
};
use tracing_subscriber::EnvFilter;

use scenepatch::model::TypeRegistry;
use scenepatch::store::{SceneFile, WriteDurability};

const DEFAULT_MCP_HTTP_PORT: u16 = 27436;
const DEFAULT_SCENE_FILE: &str = "scene.json";

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} [<scene-file>] [--schema <file>] [--durable-writes] [--mcp-http-port <port>]\n  {program} [--scene <file>] [--schema <file>] [--durable-writes] [--mcp-http-port <port>]\n  {program} --demo [--schema <file>] [--mcp-http-port <port>]\n  {program} [<scene-file>] [--schema <file>] [--durable-writes] --mcp\n  {program} --demo --mcp\n\nDefault mode serves MCP over streamable HTTP at `http://127.0.0.1:<port>/mcp`.\n--mcp-http-port selects the port (0 = ephemeral; default {DEFAULT_MCP_HTTP_PORT}).\n\nIf scene-file/--scene is omitted, `{DEFAULT_SCENE_FILE}` in the current directory is used.\n--demo uses a built-in in-memory demo scene and cannot be combined with scene-file/--scene.\n--schema merges node type definitions from a JSON file over the built-in types.\n\n--durable-writes opts into slower, best-effort durable persistence (fsync/sync where supported)."
    );
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
struct CliOptions {
    mcp: bool,
    demo: bool,
    scene_file: Option<String>,
    schema_file: Option<String>,
    mcp_http_port: Option<u16>,
    durable_writes: bool,
}

fn parse_options(mut args: impl Iterator<Item = String>) -> Result<CliOptions, ()> {
    let mut options = CliOptions::default();

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--mcp" => {
                if options.mcp {
                    return Err(());
                }
                options.mcp = true;
            }
            "--demo" => {
                if options.demo {
                    return Err(());
                }
                options.demo = true;
            }
            "--scene" => {
                if options.scene_file.is_some() {
                    return Err(());
                }
                let file = args.next().ok_or(())?;
                options.scene_file = Some(file);
            }
            "--schema" => {
                if options.schema_file.is_some() {
                    return Err(());
                }
                let file = args.next().ok_or(())?;
                options.schema_file = Some(file);
            }
            "--mcp-http-port" => {
                if options.mcp_http_port.is_some() {
                    return Err(());
                }
                let raw = args.next().ok_or(())?;
                let port: u16 = raw.parse().map_err(|_| ())?;
                options.mcp_http_port = Some(port);
            }
            "--durable-writes" => {
                if options.durable_writes {
                    return Err(());
                }
                options.durable_writes = true;
            }
            _ if arg.starts_with('-') => return Err(()),
            _ => {
                if options.scene_file.is_some() {
                    return Err(());
                }
                options.scene_file = Some(arg);
            }
        }
    }

    if options.demo && options.scene_file.is_some() {
        return Err(());
    }

    if options.mcp && options.mcp_http_port.is_some() {
        return Err(());
    }

    Ok(options)
}

fn load_registry(schema_file: Option<&str>) -> Result<Arc<TypeRegistry>, Box<dyn Error>> {
    let builtin = TypeRegistry::builtin();
    let Some(path) = schema_file else {
        return Ok(Arc::new(builtin));
    };
    let raw = std::fs::read_to_string(path)?;
    let custom = TypeRegistry::from_json_str(&raw)?;
    let merged = builtin.merge(custom)?;
    tracing::info!(path, types = merged.types().len(), "node types loaded");
    Ok(Arc::new(merged))
}

fn build_server(options: &CliOptions) -> Result<scenepatch::mcp::ScenePatchMcp, Box<dyn Error>> {
    let registry = load_registry(options.schema_file.as_deref())?;

    if options.demo {
        let tree = scenepatch::model::fixtures::demo_scene_with(registry);
        tracing::info!(nodes = tree.len(), "serving in-memory demo scene");
        return Ok(scenepatch::mcp::ScenePatchMcp::new(tree));
    }

    let path = options
        .scene_file
        .clone()
        .unwrap_or_else(|| DEFAULT_SCENE_FILE.to_owned());
    let file = if options.durable_writes {
        SceneFile::new(path).with_durability(WriteDurability::Durable)
    } else {
        SceneFile::new(path)
    };
    let tree = file.load_or_init(registry)?;
    tracing::info!(path = %file.path().display(), nodes = tree.len(), "serving scene file");
    Ok(scenepatch::mcp::ScenePatchMcp::new_persistent(tree, file))
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = (|| -> Result<(), Box<dyn Error>> {
        let mut args = std::env::args();
        let program = args.next().unwrap_or_else(|| "scenepatch".to_owned());

        let options = match parse_options(args) {
            Ok(options) => options,
            Err(()) => {
                print_usage(&program);
                std::process::exit(2);
            }
        };

        let mcp = build_server(&options)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        if options.mcp {
            runtime.block_on(mcp.serve_stdio())?;
            return Ok(());
        }

        let mcp_http_port = options.mcp_http_port.unwrap_or(DEFAULT_MCP_HTTP_PORT);
        runtime.block_on(async move {
            let listener = tokio::net::TcpListener::bind(("127.0.0.1", mcp_http_port)).await?;
            tracing::info!(address = %listener.local_addr()?, "MCP listening on /mcp");

            let config = StreamableHttpServerConfig {
                stateful_mode: true,
                ..StreamableHttpServerConfig::default()
            };
            let session_manager = Arc::new(LocalSessionManager::default());
            let mcp_service =
                StreamableHttpService::new(move || Ok(mcp.clone()), session_manager, config);

            let router = Router::new().nest_service("/mcp", mcp_service);
            axum::serve(listener, router).await?;
            Ok::<(), Box<dyn Error>>(())
        })?;

        Ok(())
    })();

    if let Err(err) = result {
        tracing::error!(error = %err, "scenepatch failed");
        eprintln!("scenepatch: {err}");
        std::process::exit(1);
    }
}
