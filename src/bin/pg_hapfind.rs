// Peregrine Assembler and SHIMMER Genome Assembly Toolkit
// 2019, 2020, 2021- (c) by Jason, Chen-Shan, Chin
//
// This Source Code Form is subject to the terms of the
// Creative Commons Attribution-NonCommercial-ShareAlike 4.0 International License.
//
// You should have received a copy of the license along with this
// work. If not, see <http://creativecommons.org/licenses/by-nc-sa/4.0/>.

const VERSION_STRING: &'static str = env!("VERSION_STRING");

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use clap::clap_app;
mod utils;
use simple_logger::SimpleLogger;
use utils::alignment::Aligner;
use utils::haplotype::{dump_bubbles, find_complex_haplotypes};
use utils::repeat_graph::read_graph_data;
use utils::{getrusage, log_resource, MaybeUninit, RUSAGE_SELF};

fn main() -> Result<(), std::io::Error> {
    let matches = clap_app!(pg_hapfind =>
        (version: VERSION_STRING)
        (author: "Jason Chin <jason@omnibio.ai>")
        (about: "
Peregrine-2021 genome assembler,
pg_hapfind: find the complex heterozygous bubbles of the assembly graph from the read paths
LICENSE: http://creativecommons.org/licenses/by-nc-sa/4.0/")
        (@arg graph_file: -g --graph_file +required +takes_value "Path to the assembly graph file")
        (@arg aln_prefix: -a --aln_prefix +required +takes_value "Path prefix for the read alignment files")
        (@arg out_prefix: -o --out_prefix +required +takes_value "Path prefix for output files")
        (@arg log: --log +takes_value "log level: DBBUG or INFO (default)")
    )
    .get_matches();

    let log_level = match matches.value_of("log").unwrap_or("INFO") {
        "DEBUG" => log::LevelFilter::Debug,
        _ => log::LevelFilter::Info,
    };

    SimpleLogger::new()
        .with_level(log_level)
        .with_utc_timestamps()
        .init()
        .unwrap();

    let graph_file = matches.value_of("graph_file").unwrap().to_string();
    let aln_prefix = matches.value_of("aln_prefix").unwrap().to_string();
    let out_prefix = matches.value_of("out_prefix").unwrap().to_string();

    let mut rdata = unsafe { MaybeUninit::uninit().assume_init() };
    let _res = unsafe { getrusage(RUSAGE_SELF, &mut rdata) };

    log_resource("BGN: load graph", &mut rdata);
    let g = read_graph_data(&graph_file);
    log::info!("graph: {} edges, {} nodes", g.edges.len(), g.nodes.len());
    log_resource("END: load graph", &mut rdata);

    log_resource("BGN: load alignments", &mut rdata);
    let aligner = Aligner::from_files(&aln_prefix, &g);
    log::info!("alignments: {}", aligner.get_alignments().len());
    log_resource("END: load alignments", &mut rdata);

    log_resource("BGN: find complex haplotypes", &mut rdata);
    let bubbles = find_complex_haplotypes(&g, &aligner);
    log_resource("END: find complex haplotypes", &mut rdata);

    let out_filename = format!("{}_bubbles.dat", out_prefix);
    dump_bubbles(&g, &bubbles, &out_filename)?;
    Ok(())
}
