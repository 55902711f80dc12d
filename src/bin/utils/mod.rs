// Peregrine Assembler and SHIMMER Genome Assembly Toolkit
// 2019, 2020, 2021- (c) by Jason, Chen-Shan, Chin
//
// This Source Code Form is subject to the terms of the
// Creative Commons Attribution-NonCommercial-ShareAlike 4.0 International License.
//
// You should have received a copy of the license along with this
// work. If not, see <http://creativecommons.org/licenses/by-nc-sa/4.0/>.

pub mod alignment;
pub mod haplotype;
pub mod repeat_graph;
pub mod utg;
pub use core::mem::MaybeUninit;
pub use libc::{getrusage, rusage, RUSAGE_SELF, RUSAGE_THREAD};

#[allow(dead_code)]
pub fn log_resource(msg: &str, data: &mut rusage) -> (u64, u64, u64) {
    let _res = unsafe { getrusage(RUSAGE_SELF, data) };
    log::info!(
        "{} : (maxRSS, utime, stime): {} {} {}",
        msg,
        data.ru_maxrss,
        data.ru_utime.tv_sec,
        data.ru_stime.tv_sec
    );

    (
        data.ru_maxrss as u64,
        data.ru_utime.tv_sec as u64,
        data.ru_stime.tv_sec as u64,
    )
}
