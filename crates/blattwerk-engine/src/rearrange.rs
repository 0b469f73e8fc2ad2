// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Manual rearrange input: "3,1,2" or "3 1 2" lists 1-based page positions in
// their new order. Only a permutation of every page is accepted.

use blattwerk_core::error::{BlattwerkError, Result};

/// Parse `input` into 0-based source indices for `page_count` pages.
///
/// The list must name every position in `1..=page_count` exactly once.
pub fn parse_rearrange(input: &str, page_count: usize) -> Result<Vec<usize>> {
    let tokens: Vec<&str> = input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.len() != page_count {
        return Err(BlattwerkError::InvalidReorderSpecification(format!(
            "expected {page_count} positions, got {}",
            tokens.len()
        )));
    }

    let mut seen = vec![false; page_count];
    let mut indices = Vec::with_capacity(page_count);
    for token in tokens {
        let position: usize = token.parse().map_err(|_| {
            BlattwerkError::InvalidReorderSpecification(format!("'{token}' is not a page number"))
        })?;
        if position == 0 || position > page_count {
            return Err(BlattwerkError::InvalidReorderSpecification(format!(
                "page {position} is outside 1..={page_count}"
            )));
        }
        let index = position - 1;
        if seen[index] {
            return Err(BlattwerkError::InvalidReorderSpecification(format!(
                "page {position} is listed twice"
            )));
        }
        seen[index] = true;
        indices.push(index);
    }
    Ok(indices)
}
