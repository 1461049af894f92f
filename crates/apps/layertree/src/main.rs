mod config;

use std::env;
use std::fmt::Write as _;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use control::{ControlOptions, LayerTreeControl};
use foundation::{NodeId, RegistrationId};
use layers::{InMemoryHostMap, Legend};
use providers::{HttpMetadataClient, ServiceMetadataClient};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use tree::TreeItem;

#[derive(Parser, Debug)]
#[command(author, version, about = "Normalize map layer registrations and replay toggles")]
struct Args {
    /// Registrations config (default: $LAYERTREE_CONFIG or layertree.json)
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print every resolved tree
    Tree {
        /// Print JSON instead of an indented outline
        #[arg(long)]
        json: bool,
    },

    /// Apply toggles in order and print the resulting host map state
    Toggle {
        /// `REG:NODE` switches a node on, `REG:NODE:off` switches it off
        #[arg(required = true, value_parser = parse_toggle)]
        toggles: Vec<ToggleCommand>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ToggleCommand {
    registration: RegistrationId,
    node: NodeId,
    on: bool,
}

fn parse_toggle(s: &str) -> Result<ToggleCommand, String> {
    let mut parts = s.split(':');
    let (Some(registration), Some(node)) = (parts.next(), parts.next()) else {
        return Err(format!("expected REG:NODE[:off], got {s:?}"));
    };
    let registration = registration
        .trim()
        .parse::<u64>()
        .map(RegistrationId)
        .map_err(|e| format!("invalid registration {registration:?}: {e}"))?;
    let node = node.parse::<NodeId>().map_err(|e| e.to_string())?;
    let on = match parts.next() {
        None | Some("on") => true,
        Some("off") => false,
        Some(other) => return Err(format!("expected on or off, got {other:?}")),
    };
    if parts.next().is_some() {
        return Err(format!("expected REG:NODE[:off], got {s:?}"));
    }
    Ok(ToggleCommand {
        registration,
        node,
        on,
    })
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let config_path = args.config.unwrap_or_else(|| {
        PathBuf::from(env::var("LAYERTREE_CONFIG").unwrap_or_else(|_| "layertree.json".to_string()))
    });
    let config = config::load(&config_path)?;
    info!(
        "loaded {} registrations from {}",
        config.layers.len(),
        config_path.display()
    );

    let offline = config.offline_client();
    let http = HttpMetadataClient::new();
    let client: &dyn ServiceMetadataClient = match &offline {
        Some(c) => c,
        None => &http,
    };

    let mut control = LayerTreeControl::new(
        InMemoryHostMap::new(),
        ControlOptions {
            render_legends: config.render_legends,
        },
    );
    for registration in config.layers {
        control.register(registration);
    }
    for result in control.load_all(client).await {
        if let Err(e) = result {
            error!("{e}");
        }
    }

    match args.command {
        Command::Tree { json } => {
            for (id, tree) in control.trees() {
                if json {
                    println!("{}", serde_json::to_string_pretty(tree)?);
                } else {
                    print!("{}", outline(tree, |node| control.is_checked(id, node)));
                }
            }
        }
        Command::Toggle { toggles } => {
            for cmd in toggles {
                let is_leaf = control
                    .tree(cmd.registration)
                    .and_then(|t| t.find(cmd.node))
                    .is_some_and(TreeItem::is_leaf);
                let delta = match (is_leaf, cmd.on) {
                    (true, true) => control.activate_leaf(cmd.registration, cmd.node)?,
                    (true, false) => control.deactivate_leaf(cmd.registration, cmd.node)?,
                    (false, true) => control.activate_node(cmd.registration, cmd.node)?,
                    (false, false) => control.deactivate_node(cmd.registration, cmd.node)?,
                };
                println!(
                    "{}:{} add={:?} remove={:?}",
                    cmd.registration, cmd.node, delta.add, delta.remove
                );
            }

            let host = control.host();
            for layer in host.shown() {
                match host.visible_sublayers(layer) {
                    Some(sublayers) => println!("layer {}\tsublayers {sublayers:?}", layer.0),
                    None => println!("layer {}", layer.0),
                }
            }
        }
    }

    Ok(())
}

fn outline(tree: &TreeItem, checked: impl Fn(NodeId) -> Option<bool>) -> String {
    fn walk(
        out: &mut String,
        item: &TreeItem,
        depth: usize,
        checked: &dyn Fn(NodeId) -> Option<bool>,
    ) {
        let mark = if checked(item.id()).unwrap_or(false) {
            "[x]"
        } else {
            "[ ]"
        };
        let _ = writeln!(
            out,
            "{:indent$}{mark} {} ({})",
            "",
            item.label(),
            item.id(),
            indent = depth * 2
        );
        if let Some(legend) = item.legend() {
            for line in legend_lines(legend) {
                let _ = writeln!(out, "{:indent$}- {line}", "", indent = depth * 2 + 4);
            }
        }
        for child in item.children() {
            walk(out, child, depth + 1, checked);
        }
    }

    let mut out = String::new();
    walk(&mut out, tree, 0, &checked);
    out
}

/// One line per legend symbol: its label and where the image comes from.
/// Inline images are decoded and reported by size.
fn legend_lines(legend: &Legend) -> Vec<String> {
    if let Legend::LargeImage { url } = legend {
        return vec![url.clone()];
    }
    legend
        .entries()
        .iter()
        .map(|entry| {
            let source = match entry.decode_image() {
                Ok(Some(bytes)) => format!("inline image, {} bytes", bytes.len()),
                Ok(None) => entry
                    .image_src()
                    .unwrap_or_else(|| "no image".to_string()),
                Err(e) => e.to_string(),
            };
            match &entry.label {
                Some(label) => format!("{label}: {source}"),
                None => source,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{outline, parse_toggle, ToggleCommand};
    use foundation::{NodeId, RegistrationId};
    use layers::{Legend, LegendEntry};
    use pretty_assertions::assert_eq;
    use tree::{TreeItem, TreeLeaf, TreeNode};

    #[test]
    fn parses_toggle_commands() {
        assert_eq!(
            parse_toggle("1:3"),
            Ok(ToggleCommand {
                registration: RegistrationId(1),
                node: NodeId::Item(3),
                on: true,
            })
        );
        assert_eq!(
            parse_toggle("2:layertree-2:off"),
            Ok(ToggleCommand {
                registration: RegistrationId(2),
                node: NodeId::Registration(RegistrationId(2)),
                on: false,
            })
        );
        assert!(parse_toggle("2").is_err());
        assert!(parse_toggle("x:1").is_err());
        assert!(parse_toggle("1:1:maybe").is_err());
    }

    #[test]
    fn outline_marks_checked_items() {
        let root_id = NodeId::Registration(RegistrationId(1));
        let mut root = TreeNode::new(root_id, "Hydro", root_id);
        root.children
            .push(TreeLeaf::new(NodeId::Item(2), "Rivers", root_id).into());
        let tree = TreeItem::from(root);

        let text = outline(&tree, |id| Some(id == NodeId::Item(2)));
        assert_eq!(text, "[ ] Hydro (layertree-1)\n  [x] Rivers (2)\n");
    }

    #[test]
    fn outline_lists_legend_symbols_under_leaves() {
        let root_id = NodeId::Registration(RegistrationId(1));
        let mut rivers = TreeLeaf::new(NodeId::Item(2), "Rivers", root_id);
        rivers.legend = Some(Legend::Multi {
            entries: vec![
                LegendEntry {
                    image_data: Some("iVBORw0KGgo=".to_string()),
                    ..LegendEntry::default()
                }
                .with_label("Major"),
                LegendEntry::from_url("https://host/legend/minor.png").with_label("Minor"),
                LegendEntry {
                    image_data: Some("not base64!".to_string()),
                    ..LegendEntry::default()
                },
            ],
        });
        let mut root = TreeNode::new(root_id, "Hydro", root_id);
        root.children.push(rivers.into());
        let tree = TreeItem::from(root);

        let text = outline(&tree, |_| Some(false));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "  [ ] Rivers (2)");
        assert_eq!(lines[2], "      - Major: inline image, 8 bytes");
        assert_eq!(lines[3], "      - Minor: https://host/legend/minor.png");
        assert!(lines[4].starts_with("      - invalid inline legend image: "));
        assert_eq!(lines.len(), 5);
    }
}
