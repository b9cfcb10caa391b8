//! See [`bracketry::workloads`] for documentation.

#![no_main]

use bracketry::workloads::Workload;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: Workload| {
    let _ = data.run();
});
