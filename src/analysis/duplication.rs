//! Redundant alternatives of a disjunction.

use std::rc::Rc;

use tracing::{debug, trace};

use crate::automaton::{set_relation, Dfa, Nfa, SetRelation};
use crate::regexp::{MatchingDirection, NodeId};
use crate::AuditError;

use super::{AnalysisContext, Automaton, Compiled, Finding, FindingKind};

/// Correct a relation computed on over-approximated automata.
///
/// `left_partial`/`right_partial` say which side's automaton accepts a
/// superset of the true language.
pub(crate) fn correct(relation: SetRelation, left_partial: bool, right_partial: bool) -> SetRelation {
    use SetRelation::*;
    match (left_partial, right_partial, relation) {
        (_, _, Disjoint) => Disjoint,
        (false, false, r) => r,
        (true, false, Equal | LeftSubset) => LeftSubset,
        (false, true, Equal | LeftSuperset) => LeftSuperset,
        _ => Unknown,
    }
}

/// The union of earlier alternatives that overlap the current one.
struct Union {
    dfa: Dfa,
    partial: bool,
    members: Vec<NodeId>,
}

impl AnalysisContext<'_> {
    /// Classify each alternative against the ones before it.
    ///
    /// With `has_trailing_context`, nothing after the disjunction can reject
    /// a shorter match, so an alternative whose words all start with a word
    /// of an earlier one is redundant too.
    pub fn classify(&self, alternatives: &[NodeId], has_trailing_context: bool) -> Vec<Finding> {
        let mut findings = Vec::new();
        self.fast_pass(alternatives, has_trailing_context, &mut findings);

        let reorderable = self.is_reorderable(alternatives);
        self.automaton_pass(alternatives, false, reorderable, &mut findings);
        if has_trailing_context {
            self.automaton_pass(alternatives, true, reorderable, &mut findings);
        }
        dedup(alternatives, findings)
    }

    fn fast_pass(&self, alternatives: &[NodeId], prefixes: bool, findings: &mut Vec<Finding>) {
        for (i, &alt) in alternatives.iter().enumerate().skip(1) {
            for &other in &alternatives[..i] {
                let kind = if self.equal_language(other, alt) {
                    FindingKind::Duplicate
                } else if self.covers(other, alt, false) {
                    FindingKind::Subset
                } else if prefixes && self.covers(other, alt, true) {
                    FindingKind::PrefixSubset
                } else {
                    continue;
                };
                findings.push(Finding {
                    kind,
                    alternative: alt,
                    others: vec![other],
                    nested: None,
                    overlap: None,
                });
            }
        }
    }

    /// Alternatives can be permuted without changing matches or captures.
    fn is_reorderable(&self, alternatives: &[NodeId]) -> bool {
        let Some(&first) = alternatives.first() else {
            return true;
        };
        if let Some(parent) = self.ast.parent(first) {
            if self.ast.contains_capture(parent) {
                return false;
            }
        }
        let info: Vec<_> = alternatives
            .iter()
            .map(|&a| {
                let compiled = self.compile(a);
                let constant = match compiled.expr.length_range() {
                    (min, Some(max)) if min == max && !compiled.partial => Some(min),
                    _ => None,
                };
                (self.first_look(a), constant)
            })
            .collect();
        for (i, (look_i, len_i)) in info.iter().enumerate() {
            for (look_j, len_j) in &info[..i] {
                let disjoint = look_i.exact
                    && look_j.exact
                    && !look_i.edge
                    && !look_j.edge
                    && look_i.chars.is_disjoint_with(&look_j.chars);
                let same_length = len_i.is_some() && len_i == len_j;
                if !disjoint && !same_length {
                    return false;
                }
            }
        }
        true
    }

    /// Automata for one alternative. In the prefix pass any string may
    /// follow it in matching order.
    fn pass_automaton(&self, alt: NodeId, prefix: bool) -> Option<Rc<Automaton>> {
        if !prefix {
            return self.automaton(alt);
        }
        let compiled = self.compile(alt);
        match self.build_prefix_automaton(&compiled, self.direction(alt)) {
            Ok(a) => Some(Rc::new(a)),
            Err(e) => {
                debug!(node = alt.index(), error = %e, "prefix automaton abandoned");
                None
            }
        }
    }

    fn build_prefix_automaton(
        &self,
        compiled: &Compiled,
        dir: MatchingDirection,
    ) -> Result<Automaton, AuditError> {
        let budget = self.options.node_budget;
        let word = Nfa::from_expr(&compiled.expr, self.max_char, budget)?;
        let any = Nfa::all_strings(self.max_char);
        // a lookbehind reads its body from the end
        let nfa = match dir {
            MatchingDirection::Ltr => {
                let mut nfa = word;
                nfa.append(&any, budget)?;
                nfa
            }
            MatchingDirection::Rtl => {
                let mut nfa = any;
                nfa.append(&word, budget)?;
                nfa
            }
        };
        let dfa = Dfa::from_nfa(&nfa, budget)?.minimize();
        Ok(Automaton {
            nfa,
            dfa,
            partial: compiled.partial,
        })
    }

    fn overlaps(&self, a: &Automaton, b: &Automaton) -> bool {
        match Dfa::intersect(&a.dfa, &b.dfa, self.options.node_budget) {
            Ok(both) => !both.is_empty(),
            Err(_) => true,
        }
    }

    fn build_union(&self, parts: &[(NodeId, Rc<Automaton>)]) -> Result<Union, AuditError> {
        let budget = self.options.node_budget;
        let mut nfa = Nfa::empty(self.max_char);
        let mut partial = false;
        for (_, part) in parts {
            nfa.union(&part.nfa, budget)?;
            partial |= part.partial;
        }
        Ok(Union {
            dfa: Dfa::from_nfa(&nfa, budget)?.minimize(),
            partial,
            members: parts.iter().map(|(id, _)| *id).collect(),
        })
    }

    fn relate(&self, left: &Automaton, union: &Union) -> SetRelation {
        match set_relation(&left.dfa, &union.dfa, self.options.node_budget) {
            Ok(r) => correct(r, left.partial, union.partial),
            Err(e) => {
                debug!(error = %e, "set relation abandoned");
                SetRelation::Unknown
            }
        }
    }

    fn automaton_pass(
        &self,
        alternatives: &[NodeId],
        prefix: bool,
        reorderable: bool,
        findings: &mut Vec<Finding>,
    ) {
        let mut earlier: Vec<(NodeId, Rc<Automaton>)> = Vec::new();
        for &alt in alternatives {
            let Some(current) = self.pass_automaton(alt, prefix) else {
                continue;
            };
            let overlapping: Vec<_> = earlier
                .iter()
                .filter(|(_, other)| self.overlaps(&current, other))
                .cloned()
                .collect();
            earlier.push((alt, current.clone()));
            if overlapping.is_empty() {
                trace!(node = alt.index(), prefix, "alternative disjoint from earlier ones");
                continue;
            }
            let union = match self.build_union(&overlapping) {
                Ok(u) => u,
                Err(e) => {
                    debug!(node = alt.index(), error = %e, "union automaton abandoned");
                    continue;
                }
            };
            let relation = self.relate(&current, &union);
            trace!(node = alt.index(), prefix, ?relation, "alternative relation");
            self.classify_relation(alt, &current, &union, relation, prefix, reorderable, findings);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn classify_relation(
        &self,
        alt: NodeId,
        current: &Automaton,
        union: &Union,
        relation: SetRelation,
        prefix: bool,
        reorderable: bool,
        findings: &mut Vec<Finding>,
    ) {
        let finding = |kind, nested| Finding {
            kind,
            alternative: alt,
            others: union.members.clone(),
            nested,
            overlap: None,
        };
        match relation {
            SetRelation::Equal | SetRelation::LeftSubset if prefix => {
                findings.push(finding(FindingKind::PrefixSubset, None))
            }
            SetRelation::Equal => findings.push(finding(FindingKind::Duplicate, None)),
            SetRelation::LeftSubset => findings.push(finding(FindingKind::Subset, None)),
            SetRelation::LeftSuperset if prefix => {}
            SetRelation::LeftSuperset if reorderable => {
                for &other in &union.members {
                    findings.push(Finding {
                        kind: FindingKind::Subset,
                        alternative: other,
                        others: vec![alt],
                        nested: None,
                        overlap: None,
                    });
                }
            }
            SetRelation::LeftSuperset => findings.push(finding(FindingKind::Superset, None)),
            SetRelation::Disjoint => {}
            SetRelation::Overlapping | SetRelation::Unknown => {
                if let Some(nested) = self.nested_subset(alt, union, prefix) {
                    let kind = if prefix {
                        FindingKind::PrefixNestedSubset
                    } else {
                        FindingKind::NestedSubset
                    };
                    findings.push(finding(kind, Some(nested)));
                } else if !prefix
                    && relation == SetRelation::Overlapping
                    && self.options.report_overlap
                {
                    let overlap = Dfa::intersect(&current.dfa, &union.dfa, self.options.node_budget)
                        .map(|d| d.minimize())
                        .ok();
                    findings.push(Finding {
                        overlap,
                        ..finding(FindingKind::Overlap, None)
                    });
                }
            }
        }
    }

    /// The first nested alternative of `alt` whose anchored language is
    /// contained in `union`.
    fn nested_subset(&self, alt: NodeId, union: &Union, prefix: bool) -> Option<NodeId> {
        self.nested_alternatives(alt).find(|&nested| {
            let compiled = self.compile_partial(alt, nested);
            let built = if prefix {
                self.build_prefix_automaton(&compiled, self.direction(alt))
            } else {
                self.build_automaton(&compiled.expr, compiled.partial)
            };
            match built {
                Ok(automaton) => matches!(
                    self.relate(&automaton, union),
                    SetRelation::Equal | SetRelation::LeftSubset
                ),
                Err(e) => {
                    debug!(node = nested.index(), error = %e, "nested automaton abandoned");
                    false
                }
            }
        })
    }
}

/// Keep the highest-priority finding per alternative, in alternative order.
fn dedup(alternatives: &[NodeId], findings: Vec<Finding>) -> Vec<Finding> {
    let mut best: Vec<Option<Finding>> = vec![None; alternatives.len()];
    for f in findings {
        let Some(pos) = alternatives.iter().position(|&a| a == f.alternative) else {
            continue;
        };
        match &best[pos] {
            Some(kept) if kept.kind <= f.kind => {}
            _ => best[pos] = Some(f),
        }
    }
    best.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::correct;
    use crate::analysis::{AnalysisContext, AnalysisOptions, Finding, FindingKind};
    use crate::automaton::SetRelation;
    use crate::regexp::{parse_literal, NodeId, RegexAst};

    fn group_alternatives(ast: &RegexAst) -> Vec<NodeId> {
        let top = ast.kind(ast.root()).alternatives().unwrap()[0];
        let group = ast.kind(top).elements().unwrap()[0];
        ast.kind(group).alternatives().unwrap().to_vec()
    }

    fn classify_top(literal: &str, options: AnalysisOptions) -> (Vec<NodeId>, Vec<Finding>) {
        let ast = parse_literal(literal).unwrap();
        let ctx = AnalysisContext::new(&ast, options);
        let alts = ast.kind(ast.root()).alternatives().unwrap().to_vec();
        let findings = ctx.classify(&alts, false);
        (alts, findings)
    }

    #[test]
    fn test_correction_table() {
        use SetRelation::*;
        assert_eq!(correct(LeftSubset, false, false), LeftSubset);
        assert_eq!(correct(Equal, true, false), LeftSubset);
        assert_eq!(correct(LeftSuperset, true, false), Unknown);
        assert_eq!(correct(Overlapping, true, false), Unknown);
        assert_eq!(correct(Equal, false, true), LeftSuperset);
        assert_eq!(correct(LeftSubset, false, true), Unknown);
        assert_eq!(correct(Equal, true, true), Unknown);
        assert_eq!(correct(Disjoint, true, true), Disjoint);
    }

    #[test]
    fn test_duplicate_subset_superset() {
        let ast = parse_literal("/(cat|cat)/").unwrap();
        let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
        let alts = group_alternatives(&ast);
        let findings = ctx.classify(&alts, false);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::Duplicate);
        assert_eq!(findings[0].alternative, alts[1]);
        assert_eq!(findings[0].others, vec![alts[0]]);

        let ast = parse_literal("/([a-z]|a)/").unwrap();
        let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
        let alts = group_alternatives(&ast);
        let findings = ctx.classify(&alts, false);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::Subset);
        assert_eq!(findings[0].alternative, alts[1]);

        let ast = parse_literal("/(a|[a-z])/").unwrap();
        let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
        let alts = group_alternatives(&ast);
        let findings = ctx.classify(&alts, false);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::Superset);
        assert_eq!(findings[0].alternative, alts[1]);
    }

    #[test]
    fn test_reorderable_superset_becomes_subset() {
        let ast = parse_literal("/(?:a|[a-z])/").unwrap();
        let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
        let alts = group_alternatives(&ast);
        let findings = ctx.classify(&alts, false);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::Subset);
        assert_eq!(findings[0].alternative, alts[0]);
        assert_eq!(findings[0].others, vec![alts[1]]);
    }

    #[test]
    fn test_prefix_subset() {
        let ast = parse_literal("/(?:a|ab)$/").unwrap();
        let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
        let alts = group_alternatives(&ast);
        assert!(ctx.classify(&alts, false).is_empty());
        let findings = ctx.classify(&alts, true);
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::PrefixSubset);
        assert_eq!(findings[0].alternative, alts[1]);
    }

    fn texts(literal: &str) -> Vec<(FindingKind, String)> {
        let ast = parse_literal(literal).unwrap();
        let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
        ctx.duplications()
            .into_iter()
            .map(|f| (f.kind, ast.text(f.alternative).to_string()))
            .collect()
    }

    #[test]
    fn test_prefix_in_lookbehind_reads_backwards() {
        assert!(texts("/(?<=a|ab)/").is_empty());
        assert!(texts("/x(?<=(?:a|ab))/").is_empty());
        assert_eq!(
            texts("/(?<=b|ab)/"),
            vec![(FindingKind::PrefixSubset, "ab".to_string())]
        );
        assert_eq!(
            texts("/x(?<=(?:b+|a+b))/"),
            vec![(FindingKind::PrefixSubset, "a+b".to_string())]
        );
    }

    #[test]
    fn test_prefix_nested_subset() {
        let ast = parse_literal("/x(?:a|(?:ab|c)d)/").unwrap();
        let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
        let findings = ctx.duplications();
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::PrefixNestedSubset);
        assert_eq!(ast.text(findings[0].alternative), "(?:ab|c)d");
        assert_eq!(ast.text(findings[0].nested.unwrap()), "ab");

        // the same alternatives need the prefix view
        let ast = parse_literal("/x(?:a|(?:ab|c)d)y/").unwrap();
        let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
        assert!(ctx.duplications().is_empty());
    }

    #[test]
    fn test_nested_subset_and_overlap() {
        let (alts, findings) = classify_top("/abc?|(?:ab|cd)/", AnalysisOptions::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::NestedSubset);
        assert_eq!(findings[0].alternative, alts[1]);
        assert!(findings[0].nested.is_some());

        let (alts, findings) = classify_top("/ab?|ac?/", AnalysisOptions::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::Overlap);
        assert_eq!(findings[0].alternative, alts[1]);
        let overlap = findings[0].overlap.as_ref().unwrap();
        assert!(overlap.accepts(&['a' as u32]));
        assert!(!overlap.accepts(&['a' as u32, 'c' as u32]));

        let options = AnalysisOptions {
            report_overlap: false,
            ..AnalysisOptions::default()
        };
        let (_, findings) = classify_top("/ab?|ac?/", options);
        assert!(findings.is_empty());
    }

    #[test]
    fn test_partial_alternatives() {
        let (alts, findings) = classify_top("/a|a(?=b)/", AnalysisOptions::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::Subset);
        assert_eq!(findings[0].alternative, alts[1]);

        let (alts, findings) = classify_top("/a(?=b)|a/", AnalysisOptions::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].kind, FindingKind::Superset);
        assert_eq!(findings[0].alternative, alts[1]);

        let (_, findings) = classify_top("/(a)\\1|aa/", AnalysisOptions::default());
        assert!(findings.iter().all(|f| f.kind != FindingKind::Subset));
    }

    #[test]
    fn test_disjoint_and_idempotent() {
        let ast = parse_literal("/foo|bar|baz|ba[rz]/").unwrap();
        let ctx = AnalysisContext::new(&ast, AnalysisOptions::default());
        let first = ctx.duplications();
        let second = ctx.duplications();
        assert_eq!(first, second);
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].kind, FindingKind::Duplicate);
        assert_eq!(first[0].others.len(), 2);
    }
}
