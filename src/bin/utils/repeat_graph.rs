// Peregrine Assembler and SHIMMER Genome Assembly Toolkit
// 2019, 2020, 2021- (c) by Jason, Chen-Shan, Chin
//
// This Source Code Form is subject to the terms of the
// Creative Commons Attribution-NonCommercial-ShareAlike 4.0 International License.
//
// You should have received a copy of the license along with this
// work. If not, see <http://creativecommons.org/licenses/by-nc-sa/4.0/>.

#![allow(dead_code)]

//
// the repeat graph data structure: a bidirected multigraph kept as node / edge
// arenas; every edge is paired with the edge representing the reverse
// complement strand of the same sequence and the two must be edited in lockstep
//

use rustc_hash::FxHashMap;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use std::io::prelude::*;

// sequence id with a strand bit, same convention as the read nodes in the
// overlap graph: strand 0 is the canonical strand
pub type SeqId = (u32, u8);

pub fn rc(id: SeqId) -> SeqId {
    (id.0, 1 - id.1)
}

pub fn id_strand(id: SeqId) -> bool {
    id.1 == 0
}

#[derive(Debug, Clone, Default)]
pub struct GraphNode {
    pub in_edges: Vec<usize>,
    pub out_edges: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct GraphEdge {
    pub edge_id: SeqId,
    pub node_left: usize,
    pub node_right: usize,
    pub length: u32,
    pub mean_coverage: f32,
    pub alt_haplotype: bool,
    pub self_complement: bool,
}

#[derive(Debug, Default)]
pub struct RepeatGraph {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
    id_to_edge: FxHashMap<SeqId, usize>,
}

impl RepeatGraph {
    pub fn new() -> Self {
        RepeatGraph {
            nodes: Vec::new(),
            edges: Vec::new(),
            id_to_edge: FxHashMap::default(),
        }
    }

    pub fn add_node(&mut self) -> usize {
        self.nodes.push(GraphNode::default());
        self.nodes.len() - 1
    }

    pub fn add_edge(
        &mut self,
        edge_id: SeqId,
        node_left: usize,
        node_right: usize,
        length: u32,
        mean_coverage: f32,
        self_complement: bool,
    ) -> usize {
        let e = self.edges.len();
        self.edges.push(GraphEdge {
            edge_id,
            node_left,
            node_right,
            length,
            mean_coverage,
            alt_haplotype: false,
            self_complement,
        });
        self.nodes[node_left].out_edges.push(e);
        self.nodes[node_right].in_edges.push(e);
        self.id_to_edge.insert(edge_id, e);
        if self_complement {
            // a self complement edge stands for both strands at once
            self.id_to_edge.insert(rc(edge_id), e);
        }
        e
    }

    pub fn edge_by_id(&self, id: SeqId) -> Option<usize> {
        self.id_to_edge.get(&id).copied()
    }

    pub fn complement_edge(&self, e: usize) -> usize {
        if self.edges[e].self_complement {
            return e;
        }
        *self.id_to_edge.get(&rc(self.edges[e].edge_id)).unwrap()
    }
}

// adjacency list surgery; a missing entry means the graph went inconsistent
// upstream, so we don't try to recover
pub fn vec_remove(v: &mut Vec<usize>, e: usize) {
    let pos = v.iter().position(|&x| x == e).unwrap();
    v.remove(pos);
}

pub fn read_graph_data<P>(filename: P) -> RepeatGraph
where
    P: AsRef<Path>,
{
    //
    // parse the edge records into the graph arenas; the adjacency list order
    // follows the record order in the file
    //

    let mut g = RepeatGraph::new();
    let mut buffer = String::new();

    let file = File::open(filename);
    let _err: Result<usize, io::Error> = file.unwrap().read_to_string(&mut buffer);
    for line in buffer.split('\n') {
        let mut v: Vec<&str> = Vec::<&str>::with_capacity(12);
        line.split(' ').for_each(|c| v.push(c));
        match v[0] {
            "G" => {
                let edge_id: SeqId = (v[1].parse().unwrap(), v[2].parse().unwrap());
                let node_left: usize = v[3].parse().unwrap();
                let node_right: usize = v[4].parse().unwrap();
                let length: u32 = v[5].parse().unwrap();
                let mean_coverage: f32 = v[6].parse().unwrap();
                let alt: u8 = v[7].parse().unwrap();
                let selfc: u8 = v[8].parse().unwrap();

                while g.nodes.len() <= node_left.max(node_right) {
                    g.add_node();
                }
                let e = g.add_edge(
                    edge_id,
                    node_left,
                    node_right,
                    length,
                    mean_coverage,
                    selfc == 1,
                );
                g.edges[e].alt_haplotype = alt == 1;
            }
            _ => (),
        }
    }
    g
}

pub fn dump_graph(g: &RepeatGraph, filename: &String) -> Result<(), io::Error> {
    let mut graph_file = BufWriter::new(File::create(filename).unwrap());
    for e in g.edges.iter() {
        writeln!(
            graph_file,
            "G {} {} {} {} {} {:.2} {} {}",
            e.edge_id.0,
            e.edge_id.1,
            e.node_left,
            e.node_right,
            e.length,
            e.mean_coverage,
            e.alt_haplotype as u8,
            e.self_complement as u8
        )?;
    }
    graph_file.flush().expect("file write error");
    Ok(())
}
