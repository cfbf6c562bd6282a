//! Geometric rules that merge, validate and reject candidate boxes.
//!
//! Each pass takes the candidate list by value and returns the survivors.
//! Removal is done by marking slots and compacting once, never by erasing
//! from the list while scanning it.

use tracing::debug;

use crate::models::Rect;

/// Tunables for the rule passes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuleConfig {
    /// Boxes lower than this are dropped before merging (heuristic)
    pub min_line_height: i32,
    /// Boxes higher than this are dropped before merging (heuristic)
    pub max_line_height: i32,

    /// Horizontal gap may go down to `-gap_overlap * min_h` (overlap)
    pub side_gap_overlap: f64,
    /// Horizontal gap may go up to `side_gap_max * min_h`
    pub side_gap_max: f64,
    /// Union vertical span must stay within `max_h + side_span_slack * min_h`
    pub side_span_slack: f64,
    /// `min_h / max_h` must exceed this to merge sideways
    pub side_height_ratio: f64,

    /// `height / width` above this is not a text line
    pub max_flatness: f64,

    /// Top-to-top distance lower bound is `upper_h - stack_gap_low * min_h`
    pub stack_gap_low: f64,
    /// Top-to-top distance upper bound (exclusive) is `upper_h + stack_gap_high * min_h`
    pub stack_gap_high: f64,
    /// Union horizontal span must stay within `max_w + stack_span_slack * min_w`
    pub stack_span_slack: f64,
    pub stack_height_ratio: f64,
    pub stack_width_ratio: f64,

    /// Lone boxes lower than this may still be kept as a long word strip
    pub strip_max_height: i32,
    /// ... when their `height / width` is below this
    pub strip_max_flatness: f64,
}

impl Default for RuleConfig {
    fn default() -> Self {
        Self {
            min_line_height: 8,
            max_line_height: 200,
            side_gap_overlap: 0.4,
            side_gap_max: 1.1,
            side_span_slack: 0.4,
            side_height_ratio: 0.6,
            max_flatness: 0.65,
            stack_gap_low: 0.2,
            stack_gap_high: 0.9,
            stack_span_slack: 0.4,
            stack_height_ratio: 0.5,
            stack_width_ratio: 0.1,
            strip_max_height: 35,
            strip_max_flatness: 0.06,
        }
    }
}

/// Drop boxes whose height cannot be a text line.
///
/// The `[min_line_height, max_line_height]` range (8 to 200 pixels by
/// default) is a tunable heuristic for the 1400 pixel working width, not a
/// measured property of text. Adjust it through [`RuleConfig`] for other
/// working widths or unusually small print.
pub fn erase_low_and_high(boxes: Vec<Rect>, config: &RuleConfig) -> Vec<Rect> {
    boxes
        .into_iter()
        .filter(|r| r.height >= config.min_line_height && r.height <= config.max_line_height)
        .collect()
}

/// Are `a` and `b` neighbouring words on the same line?
pub fn is_side_neighbour(a: &Rect, b: &Rect, config: &RuleConfig) -> bool {
    let min_h = a.height.min(b.height) as f64;
    let max_h = a.height.max(b.height) as f64;
    if min_h / max_h <= config.side_height_ratio {
        return false;
    }

    let gap = if b.x >= a.x {
        b.x - a.right()
    } else {
        a.x - b.right()
    } as f64;
    if gap < -config.side_gap_overlap * min_h || gap > config.side_gap_max * min_h {
        return false;
    }

    let span = (a.bottom().max(b.bottom()) - a.y.min(b.y)) as f64;
    span <= max_h + config.side_span_slack * min_h
}

/// Merge horizontally adjacent boxes into their union until nothing merges
pub fn connect_left_and_right(boxes: Vec<Rect>, config: &RuleConfig) -> Vec<Rect> {
    let mut slots: Vec<Option<Rect>> = boxes.into_iter().map(Some).collect();

    loop {
        let mut merged_any = false;
        for i in 0..slots.len() {
            let Some(mut current) = slots[i] else {
                continue;
            };
            loop {
                let partner = slots.iter().enumerate().find_map(|(j, slot)| match slot {
                    Some(other) if j != i && is_side_neighbour(&current, other, config) => Some(j),
                    _ => None,
                });
                let Some(j) = partner else {
                    break;
                };
                if let Some(other) = slots[j].take() {
                    current = current.union(&other);
                    merged_any = true;
                }
            }
            slots[i] = Some(current);
        }
        if !merged_any {
            break;
        }
    }

    slots.into_iter().flatten().collect()
}

/// Drop boxes taller than wide or too flat-high for a latin text line
pub fn erase_impossible(boxes: Vec<Rect>, config: &RuleConfig) -> Vec<Rect> {
    boxes
        .into_iter()
        .filter(|r| r.height <= r.width && r.flatness() <= config.max_flatness)
        .collect()
}

/// Is `b` the line directly above or below `a`?
pub fn is_stack_neighbour(a: &Rect, b: &Rect, config: &RuleConfig) -> bool {
    let min_h = a.height.min(b.height) as f64;
    let max_h = a.height.max(b.height) as f64;
    let min_w = a.width.min(b.width) as f64;
    let max_w = a.width.max(b.width) as f64;
    if min_h / max_h <= config.stack_height_ratio || min_w / max_w <= config.stack_width_ratio {
        return false;
    }

    let (upper, lower) = if a.y <= b.y { (a, b) } else { (b, a) };
    let distance = (lower.y - upper.y) as f64;
    let upper_h = upper.height as f64;
    if distance < upper_h - config.stack_gap_low * min_h
        || distance >= upper_h + config.stack_gap_high * min_h
    {
        return false;
    }

    let span = (a.right().max(b.right()) - a.x.min(b.x)) as f64;
    span <= max_w + config.stack_span_slack * min_w
}

fn is_word_strip(rect: &Rect, config: &RuleConfig) -> bool {
    rect.height < config.strip_max_height && rect.flatness() < config.strip_max_flatness
}

/// What [`check_above_and_below_and_width`] decided for the candidate list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StackOutcome {
    /// Boxes with a vertical partner
    pub candidates: Vec<Rect>,
    /// Unions of vertical pairs plus lone word strips
    pub super_boxes: Vec<Rect>,
}

/// Pair every box with a line above or below it.
///
/// Paired boxes stay candidates and their union becomes a super box. A box
/// without a partner is moved to the super boxes if it is a long word strip,
/// otherwise dropped. Partners are searched in the list as it was on entry.
pub fn check_above_and_below_and_width(boxes: Vec<Rect>, config: &RuleConfig) -> StackOutcome {
    let mut outcome = StackOutcome::default();
    for (i, rect) in boxes.iter().enumerate() {
        let partner = boxes
            .iter()
            .enumerate()
            .find(|&(j, other)| j != i && is_stack_neighbour(rect, other, config));
        match partner {
            Some((_, other)) => {
                outcome.super_boxes.push(rect.union(other));
                outcome.candidates.push(*rect);
            }
            None if is_word_strip(rect, config) => outcome.super_boxes.push(*rect),
            None => {}
        }
    }
    outcome
}

/// Run every pass in order
pub fn apply_rules(boxes: Vec<Rect>, config: &RuleConfig) -> StackOutcome {
    let total = boxes.len();
    let boxes = erase_low_and_high(boxes, config);
    let after_height = boxes.len();
    let boxes = connect_left_and_right(boxes, config);
    let after_merge = boxes.len();
    let boxes = erase_impossible(boxes, config);
    let after_shape = boxes.len();
    let outcome = check_above_and_below_and_width(boxes, config);
    debug!(
        total,
        after_height,
        after_merge,
        after_shape,
        candidates = outcome.candidates.len(),
        super_boxes = outcome.super_boxes.len(),
        "Bounding box rules applied"
    );
    outcome
}
