//! Weak-reference scan over script sources.
//!
//! Scripts name assets in string literals rather than structured id fields.
//! Each quoted literal is resolved two ways: as a registered alias (path,
//! stem, file name, `dir/stem`), or as an id spelled with or without dashes.
//! Hits become weak edges so heuristic matches stay distinguishable from
//! structural references.

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

use crate::debug_event;
use crate::registry::{DocumentRegistry, normalize_path};
use crate::scanning::scanner::ReferenceGraph;
use crate::types::AssetId;

fn quoted_literal() -> &'static Regex {
    static RX: OnceLock<Regex> = OnceLock::new();
    RX.get_or_init(|| Regex::new(r#""([\w/\-\s\.]+)""#).expect("static pattern"))
}

/// Scan one script file for weak references.
///
/// The script itself must have been registered by the sidecar pass;
/// unregistered scripts produce no edges.
pub fn process_script(
    registry: &DocumentRegistry,
    graph: &ReferenceGraph,
    root: &Path,
    script: &Path,
) {
    let Ok(rel) = script.strip_prefix(root) else {
        return;
    };
    let rel_norm = normalize_path(&rel.to_string_lossy());
    let Some(script_id) = registry.id_of(&rel_norm) else {
        debug_event!("scan", "unregistered script", "{}", script.display());
        return;
    };

    let text = match std::fs::read_to_string(script) {
        Ok(text) => text,
        Err(e) => {
            debug_event!("scan", "unreadable script", "{}: {e}", script.display());
            return;
        }
    };

    for line in text.lines() {
        for caps in quoted_literal().captures_iter(line) {
            let value = caps[1].to_lowercase();

            if let Some(target) = registry.alias_of(&value) {
                graph.add_edge(registry, script_id, target, true);
                continue;
            }

            // Literals may spell an id directly, dashed or plain. Normalize
            // so the edge always references the canonical id.
            let stripped = value.replace('-', "");
            if let Some(target) = AssetId::from_hex(&stripped) {
                if registry.path_of(&target).is_some() {
                    graph.add_edge(registry, script_id, target, true);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const ID_SCRIPT: &str = "cccccccccccccccccccccccccccccccc";
    const ID_TEXTURE: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const ID_MATERIAL: &str = "4e2a0fd1c5ba9e3387d10ab74cf80021";

    fn id(hex: &str) -> AssetId {
        AssetId::from_hex(hex).unwrap()
    }

    fn fixture() -> (DocumentRegistry, ReferenceGraph) {
        let registry = DocumentRegistry::new(HashSet::new());
        registry.register(id(ID_SCRIPT), "assets/player.cs");
        registry.register(id(ID_TEXTURE), "assets/textures/wood.png");
        registry.register(id(ID_MATERIAL), "assets/rock.mat");
        registry.add_aliases("assets/textures/wood.png", id(ID_TEXTURE));
        registry.add_aliases("assets/rock.mat", id(ID_MATERIAL));
        let graph = ReferenceGraph::new();
        graph.track(id(ID_SCRIPT));
        (registry, graph)
    }

    fn run(registry: &DocumentRegistry, graph: &ReferenceGraph, source: &str) {
        let dir = tempfile::TempDir::new().unwrap();
        let root = dir.path();
        std::fs::create_dir(root.join("assets")).unwrap();
        let script = root.join("assets/player.cs");
        std::fs::write(&script, source).unwrap();
        process_script(registry, graph, root, &script);
    }

    #[test]
    fn test_alias_literal_becomes_weak_edge() {
        let (registry, graph) = fixture();
        run(&registry, &graph, r#"var tex = Load("Textures/Wood");"#);

        let outgoing = graph.outgoing();
        let (_, targets) = outgoing
            .iter()
            .find(|(i, _)| *i == id(ID_SCRIPT))
            .unwrap();
        assert_eq!(targets, &vec![id(ID_TEXTURE)]);
        assert!(graph.is_weak(&id(ID_SCRIPT), &id(ID_TEXTURE)));
    }

    #[test]
    fn test_dashed_id_literal_normalized() {
        let (registry, graph) = fixture();
        run(
            &registry,
            &graph,
            r#"var mat = Find("4e2a0fd1-c5ba-9e33-87d1-0ab74cf80021");"#,
        );

        // The edge references the canonical id, not the dashed spelling.
        let outgoing = graph.outgoing();
        let (_, targets) = outgoing
            .iter()
            .find(|(i, _)| *i == id(ID_SCRIPT))
            .unwrap();
        assert_eq!(targets, &vec![id(ID_MATERIAL)]);
        assert!(graph.is_weak(&id(ID_SCRIPT), &id(ID_MATERIAL)));
    }

    #[test]
    fn test_unknown_literal_produces_nothing() {
        let (registry, graph) = fixture();
        run(&registry, &graph, r#"var s = Print("hello world");"#);
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_unregistered_id_literal_produces_nothing() {
        let (registry, graph) = fixture();
        run(
            &registry,
            &graph,
            r#"var x = Find("eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee");"#,
        );
        assert_eq!(graph.edge_count(), 0);
    }

    #[test]
    fn test_self_reference_via_alias_discarded() {
        let (registry, graph) = fixture();
        registry.add_aliases("assets/player.cs", id(ID_SCRIPT));
        run(&registry, &graph, r#"var me = Load("Player");"#);
        assert_eq!(graph.edge_count(), 0);
    }
}
