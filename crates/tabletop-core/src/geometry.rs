//! Spatial helpers: box selection and placement of new tokens.

use crate::model::{Token, TokenId};
use kurbo::{Point, Rect, Vec2};
use std::f64::consts::TAU;

/// Radius added per placed token when spreading tokens around a point.
pub const PLACEMENT_STEP: f64 = 16.0;

/// Position of token `index` out of `count` tokens dropped at `center`.
///
/// Tokens are spread evenly on a circle whose radius grows with `count`,
/// starting in +y direction. A single token lands exactly on `center`.
pub fn position_on_circle(center: (i32, i32), index: usize, count: usize) -> (i32, i32) {
    if count <= 1 {
        return center;
    }
    let radius = PLACEMENT_STEP * count as f64;
    let angle = TAU * (index % count) as f64 / count as f64;
    let offset = Vec2::new(-angle.sin(), angle.cos()) * radius;
    let pos = Point::new(f64::from(center.0), f64::from(center.1)) + offset;
    (pos.x.round() as i32, pos.y.round() as i32)
}

/// Ids of non-background tokens inside the closed rectangle
/// `[x, x + w] × [y, y + h]`.
pub fn tokens_in_rect(tokens: &[Token], x: i32, y: i32, w: i32, h: i32) -> Vec<TokenId> {
    let area = Rect::new(
        f64::from(x),
        f64::from(y),
        f64::from(x) + f64::from(w),
        f64::from(y) + f64::from(h),
    );
    tokens
        .iter()
        .filter(|t| !t.is_background())
        .filter(|t| contains_closed(area, Point::new(f64::from(t.posx), f64::from(t.posy))))
        .map(|t| t.id)
        .collect()
}

// kurbo's `Rect::contains` excludes the far edges.
fn contains_closed(rect: Rect, p: Point) -> bool {
    rect.x0 <= p.x && p.x <= rect.x1 && rect.y0 <= p.y && p.y <= rect.y1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Stamp;
    use crate::images::ImageRef;
    use crate::model::{BACKGROUND_SIZE, NewToken, SceneId};
    use std::collections::HashSet;

    fn token_at(id: u64, posx: i32, posy: i32, size: i32) -> Token {
        let mut new = NewToken::new(SceneId(1), ImageRef::from("/token/1/0.png"), posx, posy);
        new.size = size;
        new.into_token(TokenId(id), Stamp(1))
    }

    #[test]
    fn test_single_token_on_center() {
        assert_eq!(position_on_circle((100, 100), 0, 1), (100, 100));
    }

    #[test]
    fn test_three_tokens_distinct() {
        let positions: Vec<_> = (0..3).map(|k| position_on_circle((100, 100), k, 3)).collect();
        let unique: HashSet<_> = positions.iter().collect();
        assert_eq!(unique.len(), 3);
        assert_eq!(positions[0], (100, 148));
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(
            position_on_circle((5, -5), 2, 7),
            position_on_circle((5, -5), 2, 7)
        );
    }

    #[test]
    fn test_radius_grows_with_count() {
        let distance = |count| {
            let (x, y) = position_on_circle((0, 0), 0, count);
            f64::from(x).hypot(f64::from(y))
        };
        assert!(distance(8) > distance(3));
    }

    #[test]
    fn test_many_tokens_distinct() {
        let unique: HashSet<_> = (0..64).map(|k| position_on_circle((0, 0), k, 64)).collect();
        assert_eq!(unique.len(), 64);
    }

    #[test]
    fn test_rect_is_closed() {
        let tokens = vec![
            token_at(1, 0, 0, 20),
            token_at(2, 10, 10, 20),
            token_at(3, 11, 5, 20),
            token_at(4, 5, -1, 20),
        ];
        let mut ids = tokens_in_rect(&tokens, 0, 0, 10, 10);
        ids.sort();
        assert_eq!(ids, vec![TokenId(1), TokenId(2)]);
    }

    #[test]
    fn test_rect_excludes_background() {
        let tokens = vec![token_at(1, 5, 5, BACKGROUND_SIZE), token_at(2, 6, 6, 20)];
        assert_eq!(tokens_in_rect(&tokens, 0, 0, 10, 10), vec![TokenId(2)]);
    }

    #[test]
    fn test_negative_extent_is_empty() {
        let tokens = vec![token_at(1, 5, 5, 20)];
        assert!(tokens_in_rect(&tokens, 10, 10, -10, -10).is_empty());
    }
}
