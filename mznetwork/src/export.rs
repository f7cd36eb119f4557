//! Writing networks and component tables to disk
use std::borrow::Cow;
use std::fs;
use std::io::{self, prelude::*};
use std::path::Path;

use serde::Serialize;
use thiserror::Error;
use tracing::debug;

use crate::network::SimilarityNetwork;
use crate::table::ComponentTable;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("An IO error occurred: {0}")]
    IOError(
        #[source]
        #[from]
        io::Error,
    ),
    #[error("Failed to write table: {0}")]
    CSVError(
        #[source]
        #[from]
        csv::Error,
    ),
    #[error("Failed to write JSON: {0}")]
    JSONError(
        #[source]
        #[from]
        serde_json::Error,
    ),
}

/// The file formats a [`SimilarityNetwork`] can be written in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GraphFormat {
    #[default]
    GraphML,
    CytoscapeJSON,
}

impl GraphFormat {
    /// Guess the format from the extension of `path`, defaulting to GraphML
    pub fn infer_from_path<P: AsRef<Path>>(path: P) -> Self {
        let ext = path
            .as_ref()
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase());
        match ext.as_deref() {
            Some("json") | Some("cyjs") => Self::CytoscapeJSON,
            _ => Self::GraphML,
        }
    }
}

/// Create the parent directory of `path` and any missing ancestors.
///
/// Does nothing for a bare file name or a directory that already exists.
pub fn ensure_parent_directory<P: AsRef<Path>>(path: P) -> io::Result<()> {
    match path.as_ref().parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            if !parent.exists() {
                debug!("Creating directory {}", parent.display());
            }
            fs::create_dir_all(parent)
        }
        _ => Ok(()),
    }
}

fn escape_xml(text: &str) -> Cow<'_, str> {
    if !text.contains(&['&', '<', '>', '"', '\''][..]) {
        return Cow::Borrowed(text);
    }
    let mut escaped = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// Write `graph` as an undirected GraphML document.
///
/// Edges carry their `weight` and number of `matches`, nodes their `precursor_mz`
/// when it is known.
pub fn write_graphml<W: Write>(graph: &SimilarityNetwork, writer: W) -> io::Result<()> {
    let mut writer = io::BufWriter::new(writer);
    writeln!(writer, r#"<?xml version="1.0" encoding="UTF-8"?>"#)?;
    writeln!(
        writer,
        r#"<graphml xmlns="http://graphml.graphdrawing.org/xmlns" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:schemaLocation="http://graphml.graphdrawing.org/xmlns http://graphml.graphdrawing.org/xmlns/1.0/graphml.xsd">"#
    )?;
    writeln!(
        writer,
        r#"  <key id="weight" for="edge" attr.name="weight" attr.type="double"/>"#
    )?;
    writeln!(
        writer,
        r#"  <key id="matches" for="edge" attr.name="matches" attr.type="int"/>"#
    )?;
    writeln!(
        writer,
        r#"  <key id="precursor_mz" for="node" attr.name="precursor_mz" attr.type="double"/>"#
    )?;
    writeln!(writer, r#"  <graph edgedefault="undirected">"#)?;
    for node in graph.nodes() {
        let id = escape_xml(&node.feature_id);
        match node.precursor_mz {
            Some(mz) => {
                writeln!(writer, r#"    <node id="{id}">"#)?;
                writeln!(writer, r#"      <data key="precursor_mz">{mz}</data>"#)?;
                writeln!(writer, "    </node>")?;
            }
            None => {
                writeln!(writer, r#"    <node id="{id}"/>"#)?;
            }
        }
    }
    for edge in graph.edges() {
        let source = escape_xml(&graph.nodes()[edge.source].feature_id);
        let target = escape_xml(&graph.nodes()[edge.target].feature_id);
        writeln!(
            writer,
            r#"    <edge source="{source}" target="{target}">"#
        )?;
        writeln!(writer, r#"      <data key="weight">{}</data>"#, edge.score)?;
        writeln!(writer, r#"      <data key="matches">{}</data>"#, edge.matches)?;
        writeln!(writer, "    </edge>")?;
    }
    writeln!(writer, "  </graph>")?;
    writeln!(writer, "</graphml>")?;
    writer.flush()?;
    Ok(())
}

#[derive(Serialize)]
struct CytoscapeElement<T> {
    data: T,
}

#[derive(Serialize)]
struct CytoscapeNode<'a> {
    id: &'a str,
    precursor_mz: Option<f64>,
}

#[derive(Serialize)]
struct CytoscapeEdge<'a> {
    source: &'a str,
    target: &'a str,
    weight: f64,
    matches: usize,
}

#[derive(Serialize)]
struct CytoscapeElements<'a> {
    nodes: Vec<CytoscapeElement<CytoscapeNode<'a>>>,
    edges: Vec<CytoscapeElement<CytoscapeEdge<'a>>>,
}

#[derive(Serialize)]
struct CytoscapeDocument<'a> {
    elements: CytoscapeElements<'a>,
}

impl<'a> From<&'a SimilarityNetwork> for CytoscapeDocument<'a> {
    fn from(graph: &'a SimilarityNetwork) -> Self {
        let nodes = graph
            .nodes()
            .iter()
            .map(|node| CytoscapeElement {
                data: CytoscapeNode {
                    id: &node.feature_id,
                    precursor_mz: node.precursor_mz,
                },
            })
            .collect();
        let edges = graph
            .edges()
            .iter()
            .map(|edge| CytoscapeElement {
                data: CytoscapeEdge {
                    source: &graph.nodes()[edge.source].feature_id,
                    target: &graph.nodes()[edge.target].feature_id,
                    weight: edge.score,
                    matches: edge.matches,
                },
            })
            .collect();
        Self {
            elements: CytoscapeElements { nodes, edges },
        }
    }
}

/// Write `graph` as a Cytoscape.js elements JSON document
pub fn write_cytoscape_json<W: Write>(
    graph: &SimilarityNetwork,
    writer: W,
) -> Result<(), ExportError> {
    let mut writer = io::BufWriter::new(writer);
    serde_json::to_writer_pretty(&mut writer, &CytoscapeDocument::from(graph))?;
    writer.flush()?;
    Ok(())
}

/// Write `graph` to `path` in `format`, creating its parent directory if needed
/// and replacing any existing file.
pub fn export_graph<P: AsRef<Path>>(
    graph: &SimilarityNetwork,
    path: P,
    format: GraphFormat,
) -> Result<(), ExportError> {
    let path = path.as_ref();
    ensure_parent_directory(path)?;
    let handle = fs::File::create(path)?;
    match format {
        GraphFormat::GraphML => write_graphml(graph, handle)?,
        GraphFormat::CytoscapeJSON => write_cytoscape_json(graph, handle)?,
    }
    debug!(
        "Wrote {} nodes and {} edges to {} as {format:?}",
        graph.node_count(),
        graph.edge_count(),
        path.display()
    );
    Ok(())
}

/// Write `table` to `path` as tab-separated values, creating its parent directory
/// if needed and replacing any existing file.
pub fn export_table<P: AsRef<Path>>(table: &ComponentTable, path: P) -> Result<(), ExportError> {
    let path = path.as_ref();
    ensure_parent_directory(path)?;
    let handle = io::BufWriter::new(fs::File::create(path)?);
    table.write_tsv(handle)?;
    debug!("Wrote {} rows to {}", table.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::scorer::SimilarityScore;

    fn make_network() -> SimilarityNetwork {
        let mut network = SimilarityNetwork::new();
        let a = network.add_node("a&b", Some(300.5));
        let b = network.add_node("<b>", None);
        network.add_node("c", Some(700.0));
        network.add_edge(a, b, SimilarityScore::new(0.75, 3));
        network
    }

    #[test]
    fn test_infer_format() {
        assert_eq!(
            GraphFormat::infer_from_path("out/network.graphml"),
            GraphFormat::GraphML
        );
        assert_eq!(
            GraphFormat::infer_from_path("out/network.XML"),
            GraphFormat::GraphML
        );
        assert_eq!(
            GraphFormat::infer_from_path("network.cyjs"),
            GraphFormat::CytoscapeJSON
        );
        assert_eq!(
            GraphFormat::infer_from_path("network.json"),
            GraphFormat::CytoscapeJSON
        );
        assert_eq!(GraphFormat::infer_from_path("network"), GraphFormat::GraphML);
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape_xml("plain"), "plain");
        assert_eq!(escape_xml("a&b<'c'>\""), "a&amp;b&lt;&apos;c&apos;&gt;&quot;");
    }

    #[test]
    fn test_write_graphml() -> io::Result<()> {
        let network = make_network();
        let mut buffer = Vec::new();
        write_graphml(&network, &mut buffer)?;
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.starts_with("<?xml"));
        assert!(text.contains(r#"<graph edgedefault="undirected">"#));
        assert!(text.contains(r#"<node id="a&amp;b">"#));
        assert!(text.contains(r#"<data key="precursor_mz">300.5</data>"#));
        assert!(text.contains(r#"<node id="&lt;b&gt;"/>"#));
        assert!(text.contains(r#"<edge source="a&amp;b" target="&lt;b&gt;">"#));
        assert!(text.contains(r#"<data key="weight">0.75</data>"#));
        assert!(text.contains(r#"<data key="matches">3</data>"#));
        assert_eq!(text.matches("<node ").count(), 3);
        assert_eq!(text.matches("<edge ").count(), 1);
        Ok(())
    }

    #[test]
    fn test_write_cytoscape_json() -> Result<(), ExportError> {
        let network = make_network();
        let mut buffer = Vec::new();
        write_cytoscape_json(&network, &mut buffer)?;
        let doc: serde_json::Value = serde_json::from_slice(&buffer)?;
        let nodes = doc["elements"]["nodes"].as_array().unwrap();
        let edges = doc["elements"]["edges"].as_array().unwrap();
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0]["data"]["id"], "a&b");
        assert_eq!(nodes[0]["data"]["precursor_mz"], 300.5);
        assert!(nodes[1]["data"]["precursor_mz"].is_null());
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0]["data"]["source"], "a&b");
        assert_eq!(edges[0]["data"]["target"], "<b>");
        assert_eq!(edges[0]["data"]["matches"], 3);
        Ok(())
    }

    #[test]
    fn test_export_creates_directories() -> Result<(), ExportError> {
        let dir = tempfile::tempdir()?;
        let graph_path = dir.path().join("nested/deeper/network.graphml");
        let table_path = dir.path().join("other/components.tsv");
        let network = make_network();

        export_graph(&network, &graph_path, GraphFormat::GraphML)?;
        // Existing directories and files are fine
        export_graph(&network, &graph_path, GraphFormat::GraphML)?;
        assert!(graph_path.exists());

        export_table(&ComponentTable::default(), &table_path)?;
        let text = fs::read_to_string(&table_path)?;
        assert_eq!(text, "feature_id\tcomponent_id\tprecursor_mz\n");

        ensure_parent_directory("bare_file_name.tsv")?;
        Ok(())
    }
}
