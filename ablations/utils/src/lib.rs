//! 消融实验依赖的通用组件.

use ct_atlas::consts::gray::is_foreground;
use ct_atlas::LabelVolume;

pub mod phantom;

const SEP: &str = "--------------------------------------------------------";

/// 简单分隔线.
#[inline]
pub fn sep() {
    println!("{SEP}");
}

/// 简单分隔线.
#[inline]
pub fn sep_to<W: std::io::Write>(mut w: W) -> std::io::Result<()> {
    writeln!(&mut w, "{SEP}")
}

/// 获得可并行核心数.
pub fn cpus() -> usize {
    std::thread::available_parallelism().map_or_else(|_| num_cpus::get(), usize::from)
}

/// Dice 系数 `2|A ∩ B| / (|A| + |B|)`. 两者均为空时返回 `None`.
///
/// 两个标签形状必须一致, 否则 panic.
pub fn dice(a: &LabelVolume, b: &LabelVolume) -> Option<f64> {
    assert_eq!(a.dim(), b.dim());
    let (mut both, mut total) = (0usize, 0usize);
    for (&x, &y) in a.iter().zip(b.iter()) {
        let (x, y) = (is_foreground(x), is_foreground(y));
        both += usize::from(x && y);
        total += usize::from(x) + usize::from(y);
    }
    (total > 0).then(|| 2.0 * both as f64 / total as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dice() {
        let a = LabelVolume::from_shape_vec((1, 4, 1), vec![1, 1, 0, 0]).unwrap();
        let b = LabelVolume::from_shape_vec((1, 4, 1), vec![0, 1, 1, 0]).unwrap();
        assert_eq!(dice(&a, &a), Some(1.0));
        assert_eq!(dice(&a, &b), Some(0.5));
        let empty = LabelVolume::zeros((1, 4, 1));
        assert_eq!(dice(&empty, &empty), None);
        assert_eq!(dice(&a, &empty), Some(0.0));
    }

    #[test]
    fn test_sep_to() {
        let mut buf = Vec::new();
        sep_to(&mut buf).unwrap();
        assert_eq!(buf.len(), SEP.len() + 1);
    }
}
