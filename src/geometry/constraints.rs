//! Linear constraints over the two control-point height adjustments and the
//! small solver used by the slur engine.
//!
//! Each constraint reads `a*x + b*y >= c`, where `x` raises the left control
//! point and `y` the right one. Only non-negative adjustments are searched.

use std::cmp::Ordering;

const EPSILON: f64 = 1e-6;
/// Rings explored by the fallback grid search.
const GRID_STEPS: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlPointConstraint {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl ControlPointConstraint {
    pub fn violation(&self, x: f64, y: f64) -> f64 {
        (self.c - self.a * x - self.b * y).max(0.0)
    }

    pub fn is_satisfied(&self, x: f64, y: f64) -> bool {
        self.violation(x, y) <= EPSILON * self.c.abs().max(1.0)
    }
}

/// Adjustments chosen by the solver, in layout units (rounded up).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConstraintSolution {
    pub left: i32,
    pub right: i32,
    /// False when no point within the bound satisfies every constraint and
    /// the least-violating point was returned instead.
    pub feasible: bool,
}

/// Find the smallest pair of adjustments within `[0, bound]²` satisfying all
/// constraints.
///
/// Candidates are the vertices of the feasible polygon (axis and box
/// intercepts, pairwise intersections, the diagonal). Among feasible ones the
/// smallest total adjustment wins, then the most symmetric one. When none is
/// feasible an expanding grid search returns the first feasible ring's best
/// point, or the point minimising the maximum violation (ties: smaller sum,
/// then smaller asymmetry).
pub fn solve_control_point_constraints(constraints: &[ControlPointConstraint], bound: f64) -> ConstraintSolution {
    let active: Vec<&ControlPointConstraint> = constraints.iter().filter(|c| c.c > EPSILON).collect();
    if active.is_empty() {
        return ConstraintSolution { left: 0, right: 0, feasible: true };
    }
    let bound = bound.max(0.0);

    let mut candidates = vec![(0.0, 0.0), (bound, bound)];
    for c in &active {
        if c.a + c.b > EPSILON {
            let d = c.c / (c.a + c.b);
            candidates.push((d, d));
        }
        if c.a > EPSILON {
            candidates.push((c.c / c.a, 0.0));
            candidates.push(((c.c - c.b * bound) / c.a, bound));
        }
        if c.b > EPSILON {
            candidates.push((0.0, c.c / c.b));
            candidates.push((bound, (c.c - c.a * bound) / c.b));
        }
    }
    for (i, c1) in active.iter().enumerate() {
        for c2 in &active[i + 1..] {
            let det = c1.a * c2.b - c2.a * c1.b;
            if det.abs() > EPSILON {
                let x = (c1.c * c2.b - c2.c * c1.b) / det;
                let y = (c1.a * c2.c - c2.a * c1.c) / det;
                candidates.push((x, y));
            }
        }
    }

    let in_box = |v: f64| v >= -EPSILON && v <= bound + EPSILON;
    let best = candidates
        .into_iter()
        .filter(|&(x, y)| in_box(x) && in_box(y))
        .map(|(x, y)| (x.clamp(0.0, bound), y.clamp(0.0, bound)))
        .filter(|&(x, y)| active.iter().all(|c| c.is_satisfied(x, y)))
        .min_by(compare_adjustments);

    match best {
        Some((x, y)) => round_up(x, y, true),
        None => grid_search(&active, bound),
    }
}

fn compare_adjustments(lhs: &(f64, f64), rhs: &(f64, f64)) -> Ordering {
    (lhs.0 + lhs.1)
        .total_cmp(&(rhs.0 + rhs.1))
        .then((lhs.0 - lhs.1).abs().total_cmp(&(rhs.0 - rhs.1).abs()))
        .then(lhs.0.total_cmp(&rhs.0))
}

fn max_violation(constraints: &[&ControlPointConstraint], x: f64, y: f64) -> f64 {
    constraints.iter().map(|c| c.violation(x, y)).fold(0.0, f64::max)
}

fn grid_search(constraints: &[&ControlPointConstraint], bound: f64) -> ConstraintSolution {
    let step = bound / GRID_STEPS as f64;
    let mut least_violating = (f64::INFINITY, 0.0, 0.0);

    for ring in 0..=GRID_STEPS {
        let mut ring_best: Option<(f64, f64)> = None;
        for i in 0..=ring {
            for j in 0..=ring {
                if i.max(j) != ring {
                    continue;
                }
                let (x, y) = (i as f64 * step, j as f64 * step);
                let violation = max_violation(constraints, x, y);
                if violation <= EPSILON {
                    if ring_best.map_or(true, |best| compare_adjustments(&(x, y), &best) == Ordering::Less) {
                        ring_best = Some((x, y));
                    }
                } else {
                    let candidate = (violation, x, y);
                    let better = violation
                        .total_cmp(&least_violating.0)
                        .then_with(|| compare_adjustments(&(x, y), &(least_violating.1, least_violating.2)));
                    if better == Ordering::Less {
                        least_violating = candidate;
                    }
                }
            }
        }
        if let Some((x, y)) = ring_best {
            return round_up(x, y, true);
        }
        if step <= 0.0 {
            break;
        }
    }

    log::debug!(
        "slur constraints infeasible within bound {bound:.0}, remaining violation {:.1}",
        least_violating.0
    );
    round_up(least_violating.1, least_violating.2, false)
}

fn round_up(x: f64, y: f64, feasible: bool) -> ConstraintSolution {
    ConstraintSolution {
        left: (x - EPSILON).max(0.0).ceil() as i32,
        right: (y - EPSILON).max(0.0).ceil() as i32,
        feasible,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn constraint(a: f64, b: f64, c: f64) -> ControlPointConstraint {
        ControlPointConstraint { a, b, c }
    }

    #[test]
    fn no_active_constraint_means_no_shift() {
        let solution = solve_control_point_constraints(&[constraint(0.4, 0.2, -30.0)], 500.0);
        assert_eq!(solution, ConstraintSolution { left: 0, right: 0, feasible: true });
    }

    #[test]
    fn symmetric_constraint_gives_symmetric_shift() {
        // Midpoint constraint: 0.375x + 0.375y >= 75
        let solution = solve_control_point_constraints(&[constraint(0.375, 0.375, 75.0)], 500.0);
        assert_eq!(solution, ConstraintSolution { left: 100, right: 100, feasible: true });
    }

    #[test]
    fn lopsided_constraint_favours_cheaper_side() {
        // Near the left end the left control point is far more effective.
        let solution = solve_control_point_constraints(&[constraint(0.44, 0.06, 44.0)], 500.0);
        assert_eq!(solution, ConstraintSolution { left: 100, right: 0, feasible: true });
    }

    #[test]
    fn every_constraint_is_satisfied() {
        let constraints = [
            constraint(0.44, 0.06, 40.0),
            constraint(0.375, 0.375, 60.0),
            constraint(0.06, 0.44, 70.0),
        ];
        let solution = solve_control_point_constraints(&constraints, 1000.0);
        assert!(solution.feasible);
        for c in &constraints {
            assert!(c.a * f64::from(solution.left) + c.b * f64::from(solution.right) >= c.c - 1e-6);
        }
    }

    #[test]
    fn infeasible_returns_least_violation_within_bound() {
        let solution = solve_control_point_constraints(&[constraint(0.375, 0.375, 1000.0)], 240.0);
        assert!(!solution.feasible);
        assert_eq!(solution, ConstraintSolution { left: 240, right: 240, feasible: false });
    }

    #[test]
    fn solving_is_deterministic() {
        let constraints = [constraint(0.2, 0.3, 50.0), constraint(0.3, 0.2, 50.0)];
        let first = solve_control_point_constraints(&constraints, 400.0);
        let second = solve_control_point_constraints(&constraints, 400.0);
        assert_eq!(first, second);
        assert_eq!(first, ConstraintSolution { left: 100, right: 100, feasible: true });
    }
}
