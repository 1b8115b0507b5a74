// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! C declarations of the ABI, generated from the node kinds so the header
//! cannot drift from the function tables.
use std::fmt::Write as _;

use mig_core::NodeKind;

use crate::abi::mig_status;

/// Renders the complete C header for the bridge ABI.
pub fn c_header() -> String {
    let mut out = String::new();
    out.push_str("/* SPDX-License-Identifier: Apache-2.0 */\n");
    out.push_str("#ifndef MIG_BRIDGE_H\n#define MIG_BRIDGE_H\n\n");
    out.push_str("#include <stddef.h>\n#include <stdint.h>\n\n");
    out.push_str("#define MIG_INVALID_REF UINT64_MAX\n\n");
    out.push_str("typedef uint32_t mig_status;\n");
    for (name, status) in [
        ("OK", mig_status::OK),
        ("PROTOCOL_VIOLATION", mig_status::PROTOCOL_VIOLATION),
        ("ENGINE_FAILURE", mig_status::ENGINE_FAILURE),
    ] {
        let _ = writeln!(out, "#define MIG_STATUS_{name} {}u", status.0);
    }

    out.push_str("\ntypedef struct mig_rewrite_callback {\n    void *data;\n");
    push_adds(&mut out);
    out.push_str("    void (*mark_roots)(void *data, size_t roots_size, const uint64_t *roots);\n");
    out.push_str("    void (*release)(void *data);\n} mig_rewrite_callback;\n");

    out.push_str("\ntypedef struct mig_engine {\n    void *data;\n");
    push_adds(&mut out);
    out.push_str(
        "    mig_status (*rewrite)(void *data, size_t roots_size, const uint64_t *roots, \
         mig_rewrite_callback callback);\n",
    );
    out.push_str("    void (*release)(void *data);\n} mig_engine;\n");

    out.push_str("\nmig_engine mig_identity_engine_new(void);\n");
    out.push_str("\n#endif /* MIG_BRIDGE_H */\n");
    out
}

fn push_adds(out: &mut String) {
    for kind in NodeKind::ALL {
        let mut params = String::from("void *data");
        if kind == NodeKind::Symbol {
            params.push_str(", uint64_t name");
        }
        for i in 1..=kind.fanin() {
            let _ = write!(params, ", uint64_t id{i}");
        }
        let _ = writeln!(out, "    uint64_t (*add_{})({params});", kind.name());
    }
}
