//! 3D 体积数据与按结构组织的体积集合.

use crate::error::InvalidInputError;
use crate::{Idx2d, Idx3d};
use ndarray::{Array3, ArrayView2, ArrayView3, ArrayViewMut2, Axis};
use std::ops::{Index, IndexMut};

/// 浮点体积 (似然, 先验, 后验等). 形状为 `(L, M, N)`, 最后一维是切片方向.
pub type Volume = Array3<f64>;

/// 整数标签体积.
pub type LabelVolume = Array3<u8>;

/// 切片方向所在的轴.
pub const SLICE_AXIS: Axis = Axis(2);

/// 获取体积的切片形状 `(L, M)`.
#[inline]
pub fn slice_shape_of<T>(v: &Array3<T>) -> Idx2d {
    let (l, m, _) = v.dim();
    (l, m)
}

/// 获取第 `s` 个切片的视图. 越界时 panic.
#[inline]
pub fn slice_at<T>(v: &Array3<T>, s: usize) -> ArrayView2<'_, T> {
    v.index_axis(SLICE_AXIS, s)
}

/// 获取第 `s` 个切片的可变视图. 越界时 panic.
#[inline]
pub fn slice_at_mut<T>(v: &mut Array3<T>, s: usize) -> ArrayViewMut2<'_, T> {
    v.index_axis_mut(SLICE_AXIS, s)
}

/// 检查两个形状是否一致.
#[inline]
pub(crate) fn ensure_shape(expected: Idx3d, found: Idx3d) -> Result<(), InvalidInputError> {
    if expected == found {
        Ok(())
    } else {
        Err(InvalidInputError::ShapeMismatch { expected, found })
    }
}

/// 按结构编号组织的有序体积集合.
///
/// 下标即结构身份: 似然, 先验, 归一化项和输出标签都以相同下标对应同一结构.
/// 构造时保证集合非空, 且所有体积形状一致.
#[derive(Debug, Clone, PartialEq)]
pub struct StructureSet<T> {
    volumes: Vec<Array3<T>>,
}

impl<T> StructureSet<T> {
    /// 从体积列表创建集合.
    ///
    /// 列表为空, 体积为空, 或形状不一致时返回 `Err`.
    pub fn new(volumes: Vec<Array3<T>>) -> Result<Self, InvalidInputError> {
        let Some(first) = volumes.first() else {
            return Err(InvalidInputError::EmptyStructureSet);
        };
        if first.is_empty() {
            return Err(InvalidInputError::EmptyVolume);
        }
        let expected = first.dim();
        for v in volumes.iter().skip(1) {
            ensure_shape(expected, v.dim())?;
        }
        Ok(Self { volumes })
    }

    /// 结构个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.volumes.len()
    }

    /// 集合是否为空. 由构造保证总是 `false`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.volumes.is_empty()
    }

    /// 所有体积共同的形状 `(L, M, N)`.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.volumes[0].dim()
    }

    /// 切片个数 `N`.
    #[inline]
    pub fn len_slices(&self) -> usize {
        self.shape().2
    }

    /// 获取第 `d` 个结构的体积.
    #[inline]
    pub fn get(&self, d: usize) -> Option<&Array3<T>> {
        self.volumes.get(d)
    }

    /// 获取第 `d` 个结构体积的视图.
    #[inline]
    pub fn view(&self, d: usize) -> ArrayView3<'_, T> {
        self.volumes[d].view()
    }

    /// 按结构编号迭代.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Array3<T>> {
        self.volumes.iter()
    }

    /// 按结构编号可变迭代. 调用者不应改变体积形状.
    #[inline]
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Array3<T>> {
        self.volumes.iter_mut()
    }

    /// 以切片形式获得所有体积.
    #[inline]
    pub fn as_slice(&self) -> &[Array3<T>] {
        &self.volumes
    }

    /// 以可变切片形式获得所有体积. 调用者不应改变体积形状.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [Array3<T>] {
        &mut self.volumes
    }

    /// 消费自我, 获得底层数据.
    #[inline]
    pub fn into_inner(self) -> Vec<Array3<T>> {
        self.volumes
    }

    /// 检查 `other` 与自身的结构个数和形状是否一致.
    pub fn ensure_compatible<U>(&self, other: &StructureSet<U>) -> Result<(), InvalidInputError> {
        if self.len() != other.len() {
            return Err(InvalidInputError::LengthMismatch {
                expected: self.len(),
                found: other.len(),
            });
        }
        ensure_shape(self.shape(), other.shape())
    }
}

impl<T> Index<usize> for StructureSet<T> {
    type Output = Array3<T>;

    #[inline]
    fn index(&self, index: usize) -> &Self::Output {
        &self.volumes[index]
    }
}

impl<T> IndexMut<usize> for StructureSet<T> {
    #[inline]
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.volumes[index]
    }
}

impl<'a, T> IntoIterator for &'a StructureSet<T> {
    type Item = &'a Array3<T>;
    type IntoIter = std::slice::Iter<'a, Array3<T>>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_structure_set_rejects_empty() {
        let e = StructureSet::<f64>::new(vec![]).unwrap_err();
        assert_eq!(e, InvalidInputError::EmptyStructureSet);

        let e = StructureSet::new(vec![Volume::zeros((0, 3, 3))]).unwrap_err();
        assert_eq!(e, InvalidInputError::EmptyVolume);
    }

    #[test]
    fn test_structure_set_shape_mismatch() {
        let e = StructureSet::new(vec![Volume::zeros((2, 3, 4)), Volume::zeros((2, 4, 3))])
            .unwrap_err();
        assert_eq!(
            e,
            InvalidInputError::ShapeMismatch {
                expected: (2, 3, 4),
                found: (2, 4, 3)
            }
        );
    }

    #[test]
    fn test_structure_set_compatible() {
        let a = StructureSet::new(vec![Volume::zeros((2, 3, 4)); 2]).unwrap();
        let b = StructureSet::new(vec![LabelVolume::zeros((2, 3, 4)); 3]).unwrap();
        let c = StructureSet::new(vec![LabelVolume::zeros((2, 3, 5)); 2]).unwrap();
        assert!(matches!(
            a.ensure_compatible(&b),
            Err(InvalidInputError::LengthMismatch {
                expected: 2,
                found: 3
            })
        ));
        assert!(matches!(
            a.ensure_compatible(&c),
            Err(InvalidInputError::ShapeMismatch { .. })
        ));
        assert_eq!(a.len_slices(), 4);
    }

    #[test]
    fn test_slice_axis_is_last() {
        let mut v = Volume::zeros((2, 3, 4));
        slice_at_mut(&mut v, 3).fill(1.0);
        assert_eq!(slice_at(&v, 3).dim(), (2, 3));
        assert_eq!(v[(1, 2, 3)], 1.0);
        assert_eq!(v[(1, 2, 2)], 0.0);
        assert_eq!(slice_shape_of(&v), (2, 3));
    }
}
