//! Builtin program templates.
//!
//! A fixed registry of read-only checker sources that any session can
//! import. Importing copies the template's code, category and language
//! into the session's program map under the template's own filename,
//! overwriting an existing entry of that name.

use serde::Serialize;

use crate::document::{ProgramCategory, ProgramEntry};

/// A read-only program template.
#[derive(Debug, Clone, Copy)]
pub struct BuiltinProgram {
    pub filename: &'static str,
    pub category: ProgramCategory,
    pub language: &'static str,
    pub description: &'static str,
    pub code: &'static str,
}

impl BuiltinProgram {
    pub fn brief(&self) -> BuiltinBrief {
        BuiltinBrief {
            filename: self.filename.to_string(),
            category: self.category,
            language: self.language.to_string(),
            description: self.description.to_string(),
        }
    }

    /// The registry entry an import produces.
    pub fn entry(&self) -> ProgramEntry {
        ProgramEntry {
            category: self.category,
            language: self.language.to_string(),
            code: self.code.to_string(),
        }
    }
}

/// Listing row for the API.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct BuiltinBrief {
    pub filename: String,
    pub category: ProgramCategory,
    pub language: String,
    pub description: String,
}

/// Checker templates in the testlib style.
pub const BUILTIN_PROGRAMS: &[BuiltinProgram] = &[
    BuiltinProgram {
        filename: "ncmp.cpp",
        category: ProgramCategory::Checker,
        language: "cpp",
        description: "Compare sequences of 64-bit integers",
        code: r#"#include "testlib.h"

int main(int argc, char *argv[]) {
    setName("compare sequences of int64");
    registerTestlibCmd(argc, argv);

    int n = 0;
    while (!ans.seekEof() && !ouf.seekEof()) {
        n++;
        long long j = ans.readLong();
        long long p = ouf.readLong();
        if (j != p)
            quitf(_wa, "%d%s numbers differ - expected: '%s', found: '%s'",
                  n, englishEnding(n).c_str(), vtos(j).c_str(), vtos(p).c_str());
    }

    int extraAns = 0, extraOuf = 0;
    while (!ans.seekEof()) { ans.readLong(); extraAns++; }
    while (!ouf.seekEof()) { ouf.readLong(); extraOuf++; }
    if (extraAns > 0)
        quitf(_wa, "answer contains longer sequence [length = %d], but output contains %d elements",
              n + extraAns, n);
    if (extraOuf > 0)
        quitf(_wa, "output contains longer sequence [length = %d], but answer contains %d elements",
              n + extraOuf, n);
    quitf(_ok, "%d numbers", n);
}
"#,
    },
    BuiltinProgram {
        filename: "wcmp.cpp",
        category: ProgramCategory::Checker,
        language: "cpp",
        description: "Compare sequences of tokens",
        code: r#"#include "testlib.h"

int main(int argc, char *argv[]) {
    setName("compare sequences of tokens");
    registerTestlibCmd(argc, argv);

    int n = 0;
    while (!ans.seekEof() && !ouf.seekEof()) {
        n++;
        std::string j = ans.readWord();
        std::string p = ouf.readWord();
        if (j != p)
            quitf(_wa, "%d%s words differ - expected: '%s', found: '%s'",
                  n, englishEnding(n).c_str(), compress(j).c_str(), compress(p).c_str());
    }

    if (ans.seekEof() && ouf.seekEof())
        quitf(_ok, "%d tokens", n);
    if (ans.seekEof())
        quitf(_wa, "participant output contains extra tokens");
    quitf(_wa, "unexpected EOF in the participant output");
}
"#,
    },
    BuiltinProgram {
        filename: "lcmp.cpp",
        category: ProgramCategory::Checker,
        language: "cpp",
        description: "Compare files as sequences of lines",
        code: r#"#include "testlib.h"

bool compareWords(const std::string &a, const std::string &b) {
    std::vector<std::string> va, vb;
    std::stringstream sa(a), sb(b);
    std::string token;
    while (sa >> token) va.push_back(token);
    while (sb >> token) vb.push_back(token);
    return va == vb;
}

int main(int argc, char *argv[]) {
    setName("compare files as sequences of lines");
    registerTestlibCmd(argc, argv);

    int n = 0;
    while (!ans.eof()) {
        std::string j = ans.readLine();
        std::string p = ouf.readLine();
        n++;
        if (!compareWords(j, p))
            quitf(_wa, "%d%s lines differ - expected: '%s', found: '%s'",
                  n, englishEnding(n).c_str(), compress(j).c_str(), compress(p).c_str());
    }
    quitf(_ok, "%d lines", n);
}
"#,
    },
    BuiltinProgram {
        filename: "fcmp.cpp",
        category: ProgramCategory::Checker,
        language: "cpp",
        description: "Compare files byte for byte, line by line",
        code: r#"#include "testlib.h"

int main(int argc, char *argv[]) {
    setName("compare files as sequences of lines, lines must match exactly");
    registerTestlibCmd(argc, argv);

    int n = 0;
    while (!ans.eof()) {
        std::string j = ans.readLine();
        std::string p = ouf.readLine();
        n++;
        if (j != p)
            quitf(_wa, "%d%s lines differ - expected: '%s', found: '%s'",
                  n, englishEnding(n).c_str(), compress(j).c_str(), compress(p).c_str());
    }
    quitf(_ok, "%d lines", n);
}
"#,
    },
    BuiltinProgram {
        filename: "rcmp4.cpp",
        category: ProgramCategory::Checker,
        language: "cpp",
        description: "Compare sequences of doubles, max error 1e-4",
        code: r#"#include "testlib.h"

const double EPS = 1e-4;

int main(int argc, char *argv[]) {
    setName("compare sequences of doubles, max absolute or relative error = %.5f", EPS);
    registerTestlibCmd(argc, argv);

    int n = 0;
    while (!ans.seekEof() && !ouf.seekEof()) {
        n++;
        double j = ans.readDouble();
        double p = ouf.readDouble();
        if (!doubleCompare(j, p, EPS))
            quitf(_wa, "%d%s numbers differ - expected: '%.5f', found: '%.5f', error = '%.5f'",
                  n, englishEnding(n).c_str(), j, p, doubleDelta(j, p));
    }

    if (!ans.seekEof() || !ouf.seekEof())
        quitf(_wa, "sequence lengths differ");
    quitf(_ok, "%d numbers, max absolute or relative error %.5f", n, EPS);
}
"#,
    },
    BuiltinProgram {
        filename: "yesno.cpp",
        category: ProgramCategory::Checker,
        language: "cpp",
        description: "Single YES or NO token, case insensitive",
        code: r#"#include "testlib.h"

int main(int argc, char *argv[]) {
    setName("YES or NO (case insensitive)");
    registerTestlibCmd(argc, argv);

    std::string ja = upperCase(ans.readWord());
    std::string pa = upperCase(ouf.readWord());
    if (ja != "YES" && ja != "NO")
        quitf(_fail, "YES or NO expected in answer, but %s found", compress(ja).c_str());
    if (pa != "YES" && pa != "NO")
        quitf(_pe, "YES or NO expected, but %s found", compress(pa).c_str());
    if (ja != pa)
        quitf(_wa, "expected %s, found %s", compress(ja).c_str(), compress(pa).c_str());
    quitf(_ok, "answer is %s", compress(ja).c_str());
}
"#,
    },
];

/// Look up a template by its filename.
pub fn find_builtin(filename: &str) -> Option<&'static BuiltinProgram> {
    BUILTIN_PROGRAMS.iter().find(|b| b.filename == filename)
}

/// Listing of all templates, for the API.
pub fn list_builtins() -> Vec<BuiltinBrief> {
    BUILTIN_PROGRAMS.iter().map(|b| b.brief()).collect()
}
