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
// heterozygous structure resolution over the repeat graph. The alternative
// haplotypes of a diploid / polyploid sample show up as short parallel
// branches and small loops; the passes here find them from topology, length
// and coverage (no sequence identity is used) and either mark them or detach
// them from the main path. The edits are staged during the scan and applied
// afterwards, and each edit is mirrored on the reverse complement strand.
//

use rustc_hash::{FxHashMap, FxHashSet};

use std::fs::File;
use std::io::{self, BufWriter, Write};

use super::alignment::{Aligner, GraphAlignment};
use super::repeat_graph::{id_strand, rc, vec_remove, RepeatGraph, SeqId};
use super::utg::{get_unbranching_paths, UnbranchingPath};

// This pass collapses the simple bubbles caused by alternative haplotypes
// or strains:
// 1. structure: one input, two branches, one output: -<>-
// 2. each branch is shorter than max_bubble_len
// 3. total coverage of the branches roughly equals the input/output coverage
// 4. each branch is shorter than both the entrance and the exit, which tells
//    a bubble from two consecutive repeats of multiplicity 2
// No global coverage assumptions are used.
pub fn collapse_heterozygous_bulges(
    g: &mut RepeatGraph,
    aligner: &mut Aligner,
    max_bubble_len: u32,
    remove_alternatives: bool,
) -> usize {
    const MAX_COV_VAR: f32 = 1.5;

    let paths = get_unbranching_paths(g);

    let mut to_separate = FxHashSet::<SeqId>::default();
    let mut num_masked = 0_usize;
    for path in paths.iter() {
        if path.looped {
            continue;
        }

        let mut two_paths = Vec::<&UnbranchingPath>::new();
        for cand in paths.iter() {
            if cand.node_left == path.node_left && cand.node_right == path.node_right {
                two_paths.push(cand);
            }
        }

        // making sure the structure is ok
        if two_paths.len() != 2 {
            continue;
        }
        if two_paths[0].id == rc(two_paths[1].id) {
            continue;
        }
        if to_separate.contains(&two_paths[0].id) || to_separate.contains(&two_paths[1].id) {
            continue;
        }
        if g.nodes[two_paths[0].node_left].in_edges.len() != 1
            || g.nodes[two_paths[0].node_left].out_edges.len() != 2
            || g.nodes[two_paths[0].node_right].out_edges.len() != 1
            || g.nodes[two_paths[0].node_right].in_edges.len() != 2
        {
            continue;
        }

        let mut entrance_path = Option::<&UnbranchingPath>::None;
        let mut exit_path = Option::<&UnbranchingPath>::None;
        for cand in paths.iter() {
            if cand.node_right == two_paths[0].node_left {
                entrance_path = Some(cand);
            }
            if cand.node_left == two_paths[0].node_right {
                exit_path = Some(cand);
            }
        }
        let entrance_path = entrance_path.unwrap();
        let exit_path = exit_path.unwrap();

        // sanity check for the maximum bubble size
        if two_paths[0].length.max(two_paths[1].length) > max_bubble_len {
            continue;
        }

        // coverage requirement: the sum over the two branches roughly equals
        // the entrance and exit coverage or less
        let cov_sum = two_paths[0].mean_coverage + two_paths[1].mean_coverage;
        if cov_sum
            > (entrance_path.mean_coverage * MAX_COV_VAR).min(exit_path.mean_coverage * MAX_COV_VAR)
        {
            continue;
        }

        // require the branches to be shorter than the entrance or the exit,
        // to tell a bubble from two consecutive repeats of multiplicity 2
        if two_paths[0].length.max(two_paths[1].length)
            > entrance_path.length.max(exit_path.length)
        {
            continue;
        }

        if two_paths[0].mean_coverage > two_paths[1].mean_coverage {
            two_paths.swap(0, 1);
        }

        if !g.edges[two_paths[0].path[0]].alt_haplotype
            || !g.edges[two_paths[1].path[0]].alt_haplotype
        {
            num_masked += 1;
        }

        for i in 0..2 {
            for &e in two_paths[i].path.iter() {
                g.edges[e].alt_haplotype = true;
                let ce = g.complement_edge(e);
                g.edges[ce].alt_haplotype = true;
            }
        }

        if remove_alternatives {
            to_separate.insert(two_paths[0].id);
            to_separate.insert(rc(two_paths[0].id));
            for &e in two_paths[1].path.iter() {
                g.edges[e].mean_coverage += two_paths[0].mean_coverage;
                g.edges[e].alt_haplotype = false;
                let ce = g.complement_edge(e);
                g.edges[ce].mean_coverage += two_paths[0].mean_coverage;
                g.edges[ce].alt_haplotype = false;
            }
        }
    }

    if remove_alternatives {
        for path in paths.iter() {
            if to_separate.contains(&path.id) {
                let new_left = g.add_node();
                let new_right = g.add_node();
                let first = path.path[0];
                let last = *path.path.last().unwrap();

                let old_left = g.edges[first].node_left;
                let old_right = g.edges[last].node_right;
                vec_remove(&mut g.nodes[old_left].out_edges, first);
                vec_remove(&mut g.nodes[old_right].in_edges, last);
                g.edges[first].node_left = new_left;
                g.edges[last].node_right = new_right;
                g.nodes[new_left].out_edges.push(first);
                g.nodes[new_right].in_edges.push(last);
            }
        }

        log::info!(
            "[SIMPL] Removed {} heterozygous bulges",
            to_separate.len() / 2
        );
        aligner.update_alignments(g);
        to_separate.len() / 2
    } else {
        log::info!("[SIMPL] Masked {} heterozygous bulges", num_masked);
        num_masked
    }
}

// This pass collapses the simple loops:
// 1. one loop edge with one entrance and one exit
// 2. the loop is shorter than the entrance / exit
// 3. loop coverage is roughly equal to or less than the entrance coverage
pub fn collapse_heterozygous_loops(
    g: &mut RepeatGraph,
    aligner: &mut Aligner,
    remove_alternatives: bool,
) -> usize {
    const COV_MULT: f32 = 1.5;

    let paths = get_unbranching_paths(g);

    let mut to_unroll = FxHashSet::<SeqId>::default();
    let mut to_remove = FxHashSet::<SeqId>::default();
    let mut num_masked = 0_usize;
    for loop_path in paths.iter() {
        if !id_strand(loop_path.id) {
            continue;
        }
        if !loop_path.looped {
            continue;
        }
        if g.edges[loop_path.path[0]].self_complement {
            continue;
        }

        let node = loop_path.node_left;
        if g.nodes[node].in_edges.len() != 2 || g.nodes[node].out_edges.len() != 2 {
            continue;
        }

        let mut entrance_path = Option::<&UnbranchingPath>::None;
        let mut exit_path = Option::<&UnbranchingPath>::None;
        for cand in paths.iter() {
            if cand.node_right == node && cand.id != loop_path.id {
                entrance_path = Some(cand);
            }
            if cand.node_left == node && cand.id != loop_path.id {
                exit_path = Some(cand);
            }
        }
        let entrance_path = entrance_path.unwrap();
        let exit_path = exit_path.unwrap();

        if entrance_path.looped {
            continue;
        }
        if entrance_path.id == rc(exit_path.id) {
            continue;
        }

        // the loop coverage should be roughly equal to the entrance coverage
        // or less
        if loop_path.mean_coverage > COV_MULT * entrance_path.mean_coverage {
            continue;
        }

        // the loop should not be longer than the other branches
        if loop_path.length > entrance_path.length.max(exit_path.length) {
            continue;
        }

        if !g.edges[loop_path.path[0]].alt_haplotype {
            num_masked += 1;
        }
        for &e in loop_path.path.iter() {
            g.edges[e].alt_haplotype = true;
            let ce = g.complement_edge(e);
            g.edges[ce].alt_haplotype = true;
        }

        // either remove or unroll the loop, depending on the coverage
        if loop_path.mean_coverage
            < (entrance_path.mean_coverage + exit_path.mean_coverage) / 4.0
        {
            to_remove.insert(loop_path.id);
            to_remove.insert(rc(loop_path.id));
        } else {
            to_unroll.insert(loop_path.id);
            to_unroll.insert(rc(loop_path.id));
        }
    }

    if remove_alternatives {
        for path in paths.iter() {
            if to_unroll.contains(&path.id) {
                let new_node = g.add_node();
                let first = path.path[0];
                let last = *path.path.last().unwrap();
                let node = g.edges[first].node_left;

                // the in edge of the loop node that is not the loop itself
                let id = (g.nodes[node].in_edges[0] == last) as usize;
                let prev_edge = g.nodes[node].in_edges[id];

                vec_remove(&mut g.nodes[node].out_edges, first);
                vec_remove(&mut g.nodes[node].in_edges, prev_edge);
                g.edges[first].node_left = new_node;
                g.nodes[new_node].out_edges.push(first);
                g.edges[prev_edge].node_right = new_node;
                g.nodes[new_node].in_edges.push(prev_edge);
            }
            if to_remove.contains(&path.id) {
                let new_left = g.add_node();
                let new_right = g.add_node();
                let first = path.path[0];
                let last = *path.path.last().unwrap();
                let node = g.edges[first].node_left;

                vec_remove(&mut g.nodes[node].out_edges, first);
                vec_remove(&mut g.nodes[node].in_edges, last);
                g.edges[first].node_left = new_left;
                g.nodes[new_right].in_edges.push(last);
                g.edges[last].node_right = new_right;
                g.nodes[new_left].out_edges.push(first);
            }
        }

        log::info!(
            "[SIMPL] Removed {} heterozygous loops",
            (to_remove.len() + to_unroll.len()) / 2
        );
        aligner.update_alignments(g);
        (to_remove.len() + to_unroll.len()) / 2
    } else {
        log::info!("[SIMPL] Masked {} heterozygous loops", num_masked);
        num_masked
    }
}

#[derive(Debug, Clone)]
pub struct HaploBubble {
    pub start_edge: usize,
    pub end_edge: usize,
    // each branch is an edge chain with its read support
    pub branches: Vec<(Vec<usize>, usize)>,
}

struct PathWithScore {
    path: GraphAlignment,
    score: usize,
}

fn format_edge_id(g: &RepeatGraph, e: usize) -> String {
    let id = g.edges[e].edge_id;
    format!("{}:{}", id.0, id.1)
}

// This pass reveals the complex heterogeneities on the graph (more than two
// alternative branches) using the read paths. It only reports what it finds,
// the graph is left alone.
pub fn find_complex_haplotypes(g: &RepeatGraph, aligner: &Aligner) -> Vec<HaploBubble> {
    let alignments = aligner.get_alignments();
    let mut aln_index = FxHashMap::<usize, Vec<usize>>::default();
    for (aln_id, aln) in alignments.iter().enumerate() {
        if aln.len() > 1 {
            let mut unique_edges = FxHashSet::<usize>::default();
            for edge_aln in aln.iter() {
                unique_edges.insert(edge_aln.edge);
            }
            for edge in unique_edges {
                aln_index.entry(edge).or_insert_with(|| vec![]).push(aln_id);
            }
        }
    }

    let paths = get_unbranching_paths(g);
    let mut looped_edges = FxHashSet::<usize>::default();
    for path in paths.iter() {
        if path.looped {
            for &e in path.path.iter() {
                looped_edges.insert(e);
            }
        }
    }

    let mut bubbles = Vec::<HaploBubble>::new();
    for start_path in paths.iter() {
        if !id_strand(start_path.id) {
            continue;
        }
        if g.nodes[start_path.node_right].out_edges.len() < 2 {
            continue;
        }

        let start_edge = *start_path.path.last().unwrap();
        if looped_edges.contains(&start_edge) {
            continue;
        }

        // first, extract the alignment paths leaving through the current
        // edge and sort them from longest to shortest read span
        let mut out_paths = Vec::<GraphAlignment>::new();
        if let Some(aln_ids) = aln_index.get(&start_edge) {
            for &aln_id in aln_ids.iter() {
                let aln = &alignments[aln_id];
                for i in 0..aln.len() {
                    if aln[i].edge == start_edge {
                        out_paths.push(aln[i..].to_vec());
                        break;
                    }
                }
            }
        }
        if out_paths.is_empty() {
            continue;
        }
        out_paths.sort_by(|a1, a2| {
            let s1 = a1[a1.len() - 1].cur_end - a1[0].cur_end;
            let s2 = a2[a2.len() - 1].cur_end - a2[0].cur_end;
            s2.cmp(&s1)
        });

        // now group the paths by containment; each group keeps its longest
        // path as the reference, and the descending sort makes the first
        // match the longest compatible one
        let min_score = 2_usize.max(out_paths.len() / 10);
        let mut path_groups = Vec::<PathWithScore>::new();
        for trg_path in out_paths.iter() {
            let mut new_path = true;
            for reference_path in path_groups.iter_mut() {
                let mut contained = true;
                for i in 0..trg_path.len().min(reference_path.path.len()) {
                    if trg_path[i].edge != reference_path.path[i].edge {
                        contained = false;
                        break;
                    }
                }
                if contained {
                    new_path = false;
                    reference_path.score += 1;
                    break;
                }
            }
            if new_path {
                path_groups.push(PathWithScore {
                    path: trg_path.clone(),
                    score: 1,
                });
            }
        }
        path_groups.retain(|p| p.score >= min_score);
        if path_groups.len() < 2 {
            continue;
        }

        // edges that appear more than once within a group are repeats
        let mut repeats = FxHashSet::<usize>::default();
        for group in path_groups.iter() {
            let mut seen = FxHashSet::<usize>::default();
            for edge_aln in group.path.iter() {
                if seen.contains(&edge_aln.edge) {
                    repeats.insert(edge_aln.edge);
                }
                seen.insert(edge_aln.edge);
            }
        }

        // with the longest path as the reference, find the edges where the
        // other groups converge with it
        let mut convergence_edges = FxHashSet::<usize>::default();
        for edge_aln in path_groups[0].path.iter() {
            if !looped_edges.contains(&edge_aln.edge) && !repeats.contains(&edge_aln.edge) {
                convergence_edges.insert(edge_aln.edge);
            }
        }
        for group in path_groups[1..].iter() {
            let mut new_set = FxHashSet::<usize>::default();
            for edge_aln in group.path.iter() {
                if convergence_edges.contains(&edge_aln.edge) {
                    new_set.insert(edge_aln.edge);
                }
            }
            convergence_edges = new_set;
        }

        // the groups may agree for a while, walk to the point where they
        // start to diverge
        let mut bubble_start_id = 0_usize;
        loop {
            if bubble_start_id + 1 >= path_groups[0].path.len() {
                break;
            }
            let next_edge = path_groups[0].path[bubble_start_id + 1].edge;
            let mut agreement = true;
            for group in path_groups[1..].iter() {
                if bubble_start_id + 1 >= group.path.len()
                    || !convergence_edges.contains(&next_edge)
                    || group.path[bubble_start_id + 1].edge != next_edge
                {
                    agreement = false;
                    break;
                }
            }
            if !agreement {
                break;
            }
            bubble_start_id += 1;
        }

        // the first convergence edge after the divergence closes the bubble
        let mut found_end = false;
        let mut bubble_end_id = bubble_start_id + 1;
        while bubble_end_id < path_groups[0].path.len() {
            if convergence_edges.contains(&path_groups[0].path[bubble_end_id].edge) {
                found_end = true;
                break;
            }
            bubble_end_id += 1;
        }
        if !found_end {
            continue;
        }

        let start_e = path_groups[0].path[bubble_start_id].edge;
        let end_e = path_groups[0].path[bubble_end_id].edge;

        // shorten all the branches to the part between the boundary edges
        // and merge the ones running through the same edge chain
        let mut bubble_branches = Vec::<PathWithScore>::new();
        for group in path_groups.iter() {
            let group_start = group
                .path
                .iter()
                .position(|edge_aln| edge_aln.edge == start_e)
                .unwrap_or(0);
            let group_end = group
                .path
                .iter()
                .position(|edge_aln| edge_aln.edge == end_e)
                .unwrap_or(0);
            let new_path = group.path[group_start..=group_end].to_vec();

            let mut duplicate = false;
            for branch in bubble_branches.iter_mut() {
                if branch.path.len() != new_path.len() {
                    continue;
                }
                if branch
                    .path
                    .iter()
                    .zip(new_path.iter())
                    .all(|(a1, a2)| a1.edge == a2.edge)
                {
                    duplicate = true;
                    branch.score += group.score;
                }
            }
            if !duplicate {
                bubble_branches.push(PathWithScore {
                    path: new_path,
                    score: group.score,
                });
            }
        }
        if bubble_branches.len() < 2 {
            continue;
        }

        log::debug!(
            "haplo paths {} {}",
            format_edge_id(g, start_edge),
            out_paths.len()
        );
        for group in path_groups.iter() {
            let mut path_str = String::new();
            for edge_aln in group.path.iter() {
                path_str.push_str(&format_edge_id(g, edge_aln.edge));
                path_str.push_str(" -> ");
            }
            log::debug!("    group: {}{}", path_str, group.score);
        }
        for branch in bubble_branches.iter() {
            let mut path_str = String::new();
            for edge_aln in branch.path.iter() {
                path_str.push_str(&format_edge_id(g, edge_aln.edge));
                path_str.push_str(" -> ");
            }
            log::debug!("    branch: {}{}", path_str, branch.score);
        }
        log::debug!(
            "boundaries: {} -> {}",
            format_edge_id(g, start_e),
            format_edge_id(g, end_e)
        );

        bubbles.push(HaploBubble {
            start_edge: start_e,
            end_edge: end_e,
            branches: bubble_branches
                .into_iter()
                .map(|b| {
                    (
                        b.path.iter().map(|edge_aln| edge_aln.edge).collect(),
                        b.score,
                    )
                })
                .collect(),
        });
    }

    log::info!("[SIMPL] Found {} complex haplotype bubbles", bubbles.len());
    bubbles
}

pub fn dump_bubbles(
    g: &RepeatGraph,
    bubbles: &Vec<HaploBubble>,
    filename: &String,
) -> Result<(), io::Error> {
    let mut bubble_file = BufWriter::new(File::create(filename).unwrap());
    for (n, bubble) in bubbles.iter().enumerate() {
        writeln!(
            bubble_file,
            "B {} {} {} {}",
            n,
            format_edge_id(g, bubble.start_edge),
            format_edge_id(g, bubble.end_edge),
            bubble.branches.len()
        )?;
        for (branch, score) in bubble.branches.iter() {
            let mut path_str = String::new();
            for &e in branch.iter() {
                path_str.push_str(" ");
                path_str.push_str(&format_edge_id(g, e));
            }
            writeln!(bubble_file, "R {} {}{}", n, score, path_str)?;
        }
    }
    bubble_file.flush().expect("file write error");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::alignment::EdgeAlignment;

    // n0 -E-> n1 -A|B-> n2 -X-> n3 with the complement chain on n4..n7;
    // returns the edge arena indices [e, a, b, x, xc, ac, bc, ec]
    fn bulge_graph(
        a_len: u32,
        b_len: u32,
        e_cov: f32,
        a_cov: f32,
        b_cov: f32,
        e_len: u32,
    ) -> (RepeatGraph, [usize; 8]) {
        let mut g = RepeatGraph::new();
        let n: Vec<usize> = (0..8).map(|_| g.add_node()).collect();
        let e = g.add_edge((1, 0), n[0], n[1], e_len, e_cov, false);
        let a = g.add_edge((2, 0), n[1], n[2], a_len, a_cov, false);
        let b = g.add_edge((3, 0), n[1], n[2], b_len, b_cov, false);
        let x = g.add_edge((4, 0), n[2], n[3], e_len, e_cov, false);
        let xc = g.add_edge((4, 1), n[4], n[5], e_len, e_cov, false);
        let ac = g.add_edge((2, 1), n[5], n[6], a_len, a_cov, false);
        let bc = g.add_edge((3, 1), n[5], n[6], b_len, b_cov, false);
        let ec = g.add_edge((1, 1), n[6], n[7], e_len, e_cov, false);
        (g, [e, a, b, x, xc, ac, bc, ec])
    }

    fn empty_aligner() -> Aligner {
        Aligner::new(vec![])
    }

    #[test]
    fn test_bulge_mask_mode() {
        let (mut g, ix) = bulge_graph(500, 500, 30.0, 10.0, 20.0, 1000);
        let nodes_before = g.nodes.len();
        let adj_before: Vec<(Vec<usize>, Vec<usize>)> = g
            .nodes
            .iter()
            .map(|n| (n.in_edges.clone(), n.out_edges.clone()))
            .collect();

        let mut aligner = empty_aligner();
        let n = collapse_heterozygous_bulges(&mut g, &mut aligner, 50000, false);
        assert_eq!(n, 1);

        let [e, a, b, x, xc, ac, bc, ec] = ix;
        assert!(g.edges[a].alt_haplotype);
        assert!(g.edges[b].alt_haplotype);
        assert!(g.edges[ac].alt_haplotype);
        assert!(g.edges[bc].alt_haplotype);
        assert!(!g.edges[e].alt_haplotype);
        assert!(!g.edges[x].alt_haplotype);
        assert!(!g.edges[xc].alt_haplotype);
        assert!(!g.edges[ec].alt_haplotype);

        // mask mode leaves the topology alone
        assert_eq!(g.nodes.len(), nodes_before);
        let adj_after: Vec<(Vec<usize>, Vec<usize>)> = g
            .nodes
            .iter()
            .map(|n| (n.in_edges.clone(), n.out_edges.clone()))
            .collect();
        assert_eq!(adj_before, adj_after);

        // a second mask run finds the same bubble already flagged
        let n = collapse_heterozygous_bulges(&mut g, &mut aligner, 50000, false);
        assert_eq!(n, 0);
    }

    #[test]
    fn test_bulge_collapse_mode() {
        let (mut g, ix) = bulge_graph(500, 500, 30.0, 10.0, 20.0, 1000);
        let [e, a, b, _x, _xc, ac, bc, _ec] = ix;

        let mut aligner = empty_aligner();
        let n = collapse_heterozygous_bulges(&mut g, &mut aligner, 50000, true);
        assert_eq!(n, 1);

        // the low coverage branch keeps its flag, the kept branch absorbs
        // its coverage on both strands
        assert!(g.edges[a].alt_haplotype);
        assert!(g.edges[ac].alt_haplotype);
        assert!(!g.edges[b].alt_haplotype);
        assert!(!g.edges[bc].alt_haplotype);
        assert!((g.edges[b].mean_coverage - 30.0).abs() < 1e-6);
        assert!((g.edges[bc].mean_coverage - 30.0).abs() < 1e-6);

        // the alternative hangs off fresh nodes, the main path no longer
        // references it
        assert!(g.edges[a].node_left >= 8);
        assert!(g.edges[a].node_right >= 8);
        assert_eq!(g.nodes[g.edges[e].node_right].out_edges, vec![b]);
        assert_eq!(g.nodes[g.edges[b].node_right].in_edges, vec![b]);
        assert_eq!(g.nodes[g.edges[a].node_left].out_edges, vec![a]);
        assert_eq!(g.nodes[g.edges[a].node_right].in_edges, vec![a]);
        assert!(g.edges[ac].node_left >= 8);
        assert!(g.edges[ac].node_right >= 8);

        // twins stay in lockstep everywhere
        for e in 0..g.edges.len() {
            let ce = g.complement_edge(e);
            assert_eq!(g.edges[e].alt_haplotype, g.edges[ce].alt_haplotype);
            assert!((g.edges[e].mean_coverage - g.edges[ce].mean_coverage).abs() < 1e-6);
        }

        // and the collapse is idempotent
        let n = collapse_heterozygous_bulges(&mut g, &mut aligner, 50000, true);
        assert_eq!(n, 0);
    }

    #[test]
    fn test_bulge_adjacency_stays_coherent_after_collapse() {
        let (mut g, _ix) = bulge_graph(500, 500, 30.0, 10.0, 20.0, 1000);
        let mut aligner = empty_aligner();
        collapse_heterozygous_bulges(&mut g, &mut aligner, 50000, true);

        for (ni, node) in g.nodes.iter().enumerate() {
            for &e in node.out_edges.iter() {
                assert_eq!(g.edges[e].node_left, ni);
            }
            for &e in node.in_edges.iter() {
                assert_eq!(g.edges[e].node_right, ni);
            }
        }
        for (ei, edge) in g.edges.iter().enumerate() {
            assert!(g.nodes[edge.node_left].out_edges.contains(&ei));
            assert!(g.nodes[edge.node_right].in_edges.contains(&ei));
        }
    }

    #[test]
    fn test_bulge_oversize_is_skipped() {
        let (mut g, ix) = bulge_graph(60000, 500, 30.0, 10.0, 20.0, 100000);
        let mut aligner = empty_aligner();
        assert_eq!(
            collapse_heterozygous_bulges(&mut g, &mut aligner, 50000, false),
            0
        );
        assert_eq!(
            collapse_heterozygous_bulges(&mut g, &mut aligner, 50000, true),
            0
        );
        assert!(g.edges.iter().all(|e| !e.alt_haplotype));
        assert_eq!(g.nodes.len(), 8);
        let [_, a, _, _, _, _, _, _] = ix;
        assert_eq!(g.edges[a].node_left, 1);
    }

    #[test]
    fn test_bulge_coverage_rejected() {
        // branch coverage 20 + 20 is well above 1.5x the entrance / exit
        let (mut g, _ix) = bulge_graph(500, 500, 10.0, 20.0, 20.0, 1000);
        let mut aligner = empty_aligner();
        assert_eq!(
            collapse_heterozygous_bulges(&mut g, &mut aligner, 50000, true),
            0
        );
        assert!(g.edges.iter().all(|e| !e.alt_haplotype));
    }

    #[test]
    fn test_bulge_length_dominance_rejected() {
        // branches longer than both the entrance and the exit look like two
        // consecutive repeats of multiplicity 2, not a bubble
        let (mut g, _ix) = bulge_graph(500, 500, 30.0, 10.0, 20.0, 100);
        let mut aligner = empty_aligner();
        assert_eq!(
            collapse_heterozygous_bulges(&mut g, &mut aligner, 50000, true),
            0
        );
        assert!(g.edges.iter().all(|e| !e.alt_haplotype));
    }

    #[test]
    fn test_palindromic_bulge_is_never_collapsed() {
        // the two branches are reverse complements of each other
        let mut g = RepeatGraph::new();
        let n: Vec<usize> = (0..8).map(|_| g.add_node()).collect();
        g.add_edge((1, 0), n[0], n[1], 1000, 30.0, false);
        g.add_edge((5, 0), n[1], n[2], 500, 10.0, false);
        g.add_edge((5, 1), n[1], n[2], 500, 20.0, false);
        g.add_edge((4, 0), n[2], n[3], 1000, 30.0, false);
        g.add_edge((4, 1), n[4], n[5], 1000, 30.0, false);
        g.add_edge((1, 1), n[6], n[7], 1000, 30.0, false);

        let mut aligner = empty_aligner();
        assert_eq!(
            collapse_heterozygous_bulges(&mut g, &mut aligner, 50000, false),
            0
        );
        assert_eq!(
            collapse_heterozygous_bulges(&mut g, &mut aligner, 50000, true),
            0
        );
        assert!(g.edges.iter().all(|e| !e.alt_haplotype));
        assert_eq!(g.nodes.len(), 8);
    }

    // entrance -> N with a self loop, exit -> out, plus the complement chain;
    // returns [ent, l, ext, extc, lc, entc]
    fn loop_graph(loop_cov: f32) -> (RepeatGraph, [usize; 6]) {
        let mut g = RepeatGraph::new();
        let n: Vec<usize> = (0..6).map(|_| g.add_node()).collect();
        let ent = g.add_edge((1, 0), n[0], n[1], 1000, 20.0, false);
        let l = g.add_edge((2, 0), n[1], n[1], 500, loop_cov, false);
        let ext = g.add_edge((3, 0), n[1], n[2], 1000, 20.0, false);
        let extc = g.add_edge((3, 1), n[3], n[4], 1000, 20.0, false);
        let lc = g.add_edge((2, 1), n[4], n[4], 500, loop_cov, false);
        let entc = g.add_edge((1, 1), n[4], n[5], 1000, 20.0, false);
        (g, [ent, l, ext, extc, lc, entc])
    }

    #[test]
    fn test_loop_mask_mode() {
        let (mut g, ix) = loop_graph(15.0);
        let [ent, l, ext, _extc, lc, _entc] = ix;
        let mut aligner = empty_aligner();
        let n = collapse_heterozygous_loops(&mut g, &mut aligner, false);
        assert_eq!(n, 1);
        assert!(g.edges[l].alt_haplotype);
        assert!(g.edges[lc].alt_haplotype);
        assert!(!g.edges[ent].alt_haplotype);
        assert!(!g.edges[ext].alt_haplotype);
        assert_eq!(g.nodes.len(), 6);

        let n = collapse_heterozygous_loops(&mut g, &mut aligner, false);
        assert_eq!(n, 0);
    }

    #[test]
    fn test_loop_unroll() {
        // coverage 15 is above (20 + 20) / 4, the loop gets unrolled into a
        // linear tail: ent -> N' -> loop -> N -> exit
        let (mut g, ix) = loop_graph(15.0);
        let [ent, l, ext, extc, lc, entc] = ix;
        let mut aligner = empty_aligner();
        let n = collapse_heterozygous_loops(&mut g, &mut aligner, true);
        assert_eq!(n, 1);

        let np = g.edges[l].node_left;
        assert!(np >= 6);
        assert_eq!(g.edges[ent].node_right, np);
        assert_eq!(g.nodes[np].in_edges, vec![ent]);
        assert_eq!(g.nodes[np].out_edges, vec![l]);
        let old = g.edges[l].node_right;
        assert_eq!(old, 1);
        assert_eq!(g.nodes[old].in_edges, vec![l]);
        assert_eq!(g.nodes[old].out_edges, vec![ext]);

        // same unroll on the complement strand
        let npc = g.edges[lc].node_left;
        assert!(npc >= 6);
        assert_eq!(g.edges[extc].node_right, npc);
        assert_eq!(g.nodes[npc].in_edges, vec![extc]);
        assert_eq!(g.nodes[npc].out_edges, vec![lc]);
        assert_eq!(g.nodes[g.edges[lc].node_right].out_edges, vec![entc]);
    }

    #[test]
    fn test_loop_remove() {
        // coverage 5 is below (20 + 20) / 4, the loop gets detached
        let (mut g, ix) = loop_graph(5.0);
        let [ent, l, ext, _extc, lc, _entc] = ix;
        let mut aligner = empty_aligner();
        let n = collapse_heterozygous_loops(&mut g, &mut aligner, true);
        assert_eq!(n, 1);

        assert_eq!(g.nodes[1].in_edges, vec![ent]);
        assert_eq!(g.nodes[1].out_edges, vec![ext]);
        assert!(g.edges[l].node_left >= 6);
        assert!(g.edges[l].node_right >= 6);
        assert_ne!(g.edges[l].node_left, g.edges[l].node_right);
        assert_eq!(g.nodes[g.edges[l].node_left].out_edges, vec![l]);
        assert_eq!(g.nodes[g.edges[l].node_right].in_edges, vec![l]);
        assert!(g.edges[l].alt_haplotype);
        assert!(g.edges[lc].alt_haplotype);
        assert!(g.edges[lc].node_left >= 6);
    }

    #[test]
    fn test_self_complement_loop_is_skipped() {
        let mut g = RepeatGraph::new();
        let n: Vec<usize> = (0..6).map(|_| g.add_node()).collect();
        g.add_edge((1, 0), n[0], n[1], 1000, 20.0, false);
        g.add_edge((2, 0), n[1], n[1], 500, 15.0, true);
        g.add_edge((3, 0), n[1], n[2], 1000, 20.0, false);
        g.add_edge((3, 1), n[3], n[4], 1000, 20.0, false);
        g.add_edge((1, 1), n[4], n[5], 1000, 20.0, false);

        let mut aligner = empty_aligner();
        assert_eq!(collapse_heterozygous_loops(&mut g, &mut aligner, false), 0);
        assert_eq!(collapse_heterozygous_loops(&mut g, &mut aligner, true), 0);
        assert!(g.edges.iter().all(|e| !e.alt_haplotype));
        assert_eq!(g.nodes.len(), 6);
    }

    // n0 -S-> n1 -P|Q|R-> n2 -T-> n3 with the complement chain on n4..n7
    fn three_branch_graph() -> (RepeatGraph, [usize; 5]) {
        let mut g = RepeatGraph::new();
        let n: Vec<usize> = (0..8).map(|_| g.add_node()).collect();
        let s = g.add_edge((1, 0), n[0], n[1], 1000, 30.0, false);
        let p = g.add_edge((2, 0), n[1], n[2], 500, 10.0, false);
        let q = g.add_edge((3, 0), n[1], n[2], 500, 10.0, false);
        let r = g.add_edge((4, 0), n[1], n[2], 500, 10.0, false);
        let t = g.add_edge((5, 0), n[2], n[3], 1000, 30.0, false);
        g.add_edge((5, 1), n[4], n[5], 1000, 30.0, false);
        g.add_edge((2, 1), n[5], n[6], 500, 10.0, false);
        g.add_edge((3, 1), n[5], n[6], 500, 10.0, false);
        g.add_edge((4, 1), n[5], n[6], 500, 10.0, false);
        g.add_edge((1, 1), n[6], n[7], 1000, 30.0, false);
        (g, [s, p, q, r, t])
    }

    fn read_through(s: usize, mid: usize, t: usize) -> GraphAlignment {
        vec![
            EdgeAlignment {
                edge: s,
                cur_bgn: 0,
                cur_end: 1000,
            },
            EdgeAlignment {
                edge: mid,
                cur_bgn: 1000,
                cur_end: 1500,
            },
            EdgeAlignment {
                edge: t,
                cur_bgn: 1500,
                cur_end: 2500,
            },
        ]
    }

    #[test]
    fn test_complex_finder_reports_three_branches() {
        let (g, ix) = three_branch_graph();
        let [s, p, q, r, t] = ix;

        let mut alns = Vec::new();
        for &mid in [p, q, r].iter() {
            alns.push(read_through(s, mid, t));
            alns.push(read_through(s, mid, t));
        }
        let aligner = Aligner::new(alns);

        let bubbles = find_complex_haplotypes(&g, &aligner);
        assert_eq!(bubbles.len(), 1);
        assert_eq!(bubbles[0].start_edge, s);
        assert_eq!(bubbles[0].end_edge, t);
        assert_eq!(bubbles[0].branches.len(), 3);
        for (branch, score) in bubbles[0].branches.iter() {
            assert_eq!(branch.len(), 3);
            assert_eq!(branch[0], s);
            assert_eq!(*branch.last().unwrap(), t);
            assert_eq!(*score, 2);
        }

        // diagnostic only, nothing is touched
        assert!(g.edges.iter().all(|e| !e.alt_haplotype));
    }

    #[test]
    fn test_complex_finder_prefix_reads_feed_group_scores() {
        let (g, ix) = three_branch_graph();
        let [s, p, q, r, t] = ix;

        let mut alns = Vec::new();
        alns.push(read_through(s, p, t));
        alns.push(read_through(s, q, t));
        alns.push(read_through(s, q, t));
        // a short read that stops inside the first branch still supports it
        alns.push(vec![
            EdgeAlignment {
                edge: s,
                cur_bgn: 0,
                cur_end: 1000,
            },
            EdgeAlignment {
                edge: p,
                cur_bgn: 1000,
                cur_end: 1500,
            },
        ]);
        // a lone branch below the score cut drops out
        alns.push(read_through(s, r, t));
        let aligner = Aligner::new(alns);

        let bubbles = find_complex_haplotypes(&g, &aligner);
        assert_eq!(bubbles.len(), 1);
        assert_eq!(bubbles[0].branches.len(), 2);
        let scores: Vec<usize> = bubbles[0].branches.iter().map(|b| b.1).collect();
        assert!(scores.contains(&2));
    }

    #[test]
    fn test_complex_finder_needs_two_groups() {
        let (g, ix) = three_branch_graph();
        let [s, p, _q, _r, t] = ix;

        let alns = vec![read_through(s, p, t), read_through(s, p, t)];
        let aligner = Aligner::new(alns);
        assert!(find_complex_haplotypes(&g, &aligner).is_empty());
    }
}
