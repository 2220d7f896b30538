//! File name pattern matching (`*` and `?` wildcards).

/// Match `name` against `pattern`. `*` matches any run of characters, `?`
/// exactly one. ASCII case-insensitive, matching how desktop users expect
/// `*.PDF` and `*.pdf` to behave the same.
///
/// Iterative two-pointer matcher with single-star backtracking; no recursion,
/// no allocation.
pub fn glob_match(pattern: &str, name: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let n: Vec<char> = name.chars().collect();

    let (mut pi, mut ni) = (0usize, 0usize);
    // Position after the most recent '*' and the name index it was tried at.
    let (mut star, mut mark): (Option<usize>, usize) = (None, 0);

    while ni < n.len() {
        if pi < p.len() && (p[pi] == '?' || chars_eq(p[pi], n[ni])) {
            pi += 1;
            ni += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi + 1);
            mark = ni;
            pi += 1;
        } else if let Some(s) = star {
            // Let the last '*' swallow one more character and retry.
            mark += 1;
            ni = mark;
            pi = s;
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}

fn chars_eq(a: char, b: char) -> bool {
    a == b || a.eq_ignore_ascii_case(&b)
}
