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
// read-to-graph alignments: each alignment is the chain of graph edges one
// read runs through, with the read coordinates covered by each edge; the
// chunked alignment files come from the aligner stage
//

use glob::glob;

use std::fs::File;
use std::io;
use std::path::Path;
use std::thread;

use std::io::prelude::*;

use super::repeat_graph::{RepeatGraph, SeqId};

#[derive(Debug, Copy, Clone)]
pub struct EdgeAlignment {
    pub edge: usize,
    pub cur_bgn: u32,
    pub cur_end: u32,
}

pub type GraphAlignment = Vec<EdgeAlignment>;

fn read_aln_chunk<P>(filename: P) -> Vec<Vec<(SeqId, u32, u32)>>
where
    P: AsRef<Path>,
{
    //
    // parse one chunk of alignment records; the records of one alignment are
    // contiguous and ordered along the read
    //

    let mut out = Vec::<Vec<(SeqId, u32, u32)>>::new();
    let mut cur_aln = Option::<u32>::None;
    let mut buffer = String::new();

    let file = File::open(filename);
    let _err: Result<usize, io::Error> = file.unwrap().read_to_string(&mut buffer);
    for line in buffer.split('\n') {
        let mut v: Vec<&str> = Vec::<&str>::with_capacity(8);
        line.split(' ').for_each(|c| v.push(c));
        match v[0] {
            "A" => {
                let aln_id: u32 = v[1].parse().unwrap();
                let edge_id: SeqId = (v[2].parse().unwrap(), v[3].parse().unwrap());
                let cur_bgn: u32 = v[4].parse().unwrap();
                let cur_end: u32 = v[5].parse().unwrap();

                if cur_aln != Some(aln_id) {
                    out.push(Vec::new());
                    cur_aln = Some(aln_id);
                }
                out.last_mut().unwrap().push((edge_id, cur_bgn, cur_end));
            }
            _ => (),
        }
    }
    out
}

pub struct Aligner {
    alignments: Vec<GraphAlignment>,
}

impl Aligner {
    pub fn new(alignments: Vec<GraphAlignment>) -> Self {
        Aligner { alignments }
    }

    pub fn from_files(prefix: &str, g: &RepeatGraph) -> Self {
        let infile_pattern = [prefix.to_string(), "*".to_string()].concat();

        let mut children = Vec::new();
        for entry in glob(&infile_pattern).expect("Failed to read glob pattern") {
            match entry {
                Ok(path) => {
                    let child = thread::spawn(move || read_aln_chunk(path));
                    children.push(child);
                }
                Err(e) => println!("{:?}", e),
            }
        }

        let mut alignments = Vec::<GraphAlignment>::new();
        for child in children {
            let chunk = child.join().expect("oops! the child thread panicked");
            for aln in chunk {
                let mapped = aln
                    .iter()
                    .map(|&(id, cur_bgn, cur_end)| EdgeAlignment {
                        edge: g.edge_by_id(id).unwrap(),
                        cur_bgn,
                        cur_end,
                    })
                    .collect::<GraphAlignment>();
                alignments.push(mapped);
            }
        }
        Aligner { alignments }
    }

    pub fn get_alignments(&self) -> &Vec<GraphAlignment> {
        &self.alignments
    }

    pub fn update_alignments(&mut self, g: &RepeatGraph) {
        //
        // after structural edits an alignment may run through a junction that
        // no longer connects; break those chains apart and keep the pieces
        //

        let mut updated = Vec::<GraphAlignment>::new();
        for aln in self.alignments.iter() {
            let mut run = GraphAlignment::new();
            for ea in aln.iter() {
                if let Some(last) = run.last() {
                    if g.edges[last.edge].node_right != g.edges[ea.edge].node_left {
                        updated.push(run);
                        run = GraphAlignment::new();
                    }
                }
                run.push(*ea);
            }
            if !run.is_empty() {
                updated.push(run);
            }
        }
        log::debug!(
            "updated alignments: {} -> {}",
            self.alignments.len(),
            updated.len()
        );
        self.alignments = updated;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn two_edge_graph() -> (RepeatGraph, usize, usize) {
        let mut g = RepeatGraph::new();
        let n0 = g.add_node();
        let n1 = g.add_node();
        let n2 = g.add_node();
        let m: Vec<usize> = (0..3).map(|_| g.add_node()).collect();
        let e1 = g.add_edge((1, 0), n0, n1, 100, 10.0, false);
        let e2 = g.add_edge((2, 0), n1, n2, 100, 10.0, false);
        g.add_edge((2, 1), m[0], m[1], 100, 10.0, false);
        g.add_edge((1, 1), m[1], m[2], 100, 10.0, false);
        (g, e1, e2)
    }

    #[test]
    fn test_update_alignments_splits_at_broken_junctions() {
        let (mut g, e1, e2) = two_edge_graph();
        let aln = vec![
            EdgeAlignment {
                edge: e1,
                cur_bgn: 0,
                cur_end: 100,
            },
            EdgeAlignment {
                edge: e2,
                cur_bgn: 100,
                cur_end: 200,
            },
        ];
        let mut aligner = Aligner::new(vec![aln]);

        aligner.update_alignments(&g);
        assert_eq!(aligner.get_alignments().len(), 1);

        // detach e2 onto fresh nodes and the chain has to split
        let new_left = g.add_node();
        let new_right = g.add_node();
        crate::utils::repeat_graph::vec_remove(&mut g.nodes[1].out_edges, e2);
        crate::utils::repeat_graph::vec_remove(&mut g.nodes[2].in_edges, e2);
        g.edges[e2].node_left = new_left;
        g.edges[e2].node_right = new_right;
        g.nodes[new_left].out_edges.push(e2);
        g.nodes[new_right].in_edges.push(e2);

        aligner.update_alignments(&g);
        let alns = aligner.get_alignments();
        assert_eq!(alns.len(), 2);
        assert_eq!(alns[0].len(), 1);
        assert_eq!(alns[0][0].edge, e1);
        assert_eq!(alns[1].len(), 1);
        assert_eq!(alns[1][0].edge, e2);
    }

    #[test]
    fn test_from_files_reads_chunks() {
        let (g, e1, e2) = two_edge_graph();

        let prefix = std::env::temp_dir()
            .join(format!("hapres_aln_{}", std::process::id()))
            .to_str()
            .unwrap()
            .to_string();
        let chunk = format!("{}_00.dat", prefix);
        {
            let mut f = File::create(&chunk).unwrap();
            writeln!(f, "A 0 1 0 0 100").unwrap();
            writeln!(f, "A 0 2 0 100 200").unwrap();
            writeln!(f, "A 1 2 0 0 90").unwrap();
        }

        let aligner = Aligner::from_files(&prefix, &g);
        std::fs::remove_file(&chunk).unwrap();

        let alns = aligner.get_alignments();
        assert_eq!(alns.len(), 2);
        assert_eq!(alns[0].len(), 2);
        assert_eq!(alns[0][0].edge, e1);
        assert_eq!(alns[0][1].edge, e2);
        assert_eq!(alns[0][1].cur_end, 200);
        assert_eq!(alns[1].len(), 1);
        assert_eq!(alns[1][0].edge, e2);
    }
}
