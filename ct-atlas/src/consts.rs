//! 通用常量.

/// 单通道标签值.
pub mod gray {
    /// 背景体素值.
    pub const BACKGROUND: u8 = 0;

    /// 二值标签中, 属于当前结构的体素值.
    pub const FOREGROUND: u8 = 1;

    /// 体素是否是背景?
    #[inline]
    pub const fn is_background(p: u8) -> bool {
        matches!(p, BACKGROUND)
    }

    /// 体素是否是前景?
    #[inline]
    pub const fn is_foreground(p: u8) -> bool {
        !is_background(p)
    }
}

/// 能量图相关常量.
pub mod energy {
    /// 一阶 (4-相邻) 边的权重.
    pub const FIRST_ORDER_WEIGHT: i32 = 18;

    /// 二阶 (间隔一个像素) 边的权重. 远小于一阶权重.
    pub const SECOND_ORDER_WEIGHT: i32 = 1;

    /// 后验概率到整数一元能量的缩放倍数.
    pub const ENERGY_SCALE: f64 = 4000.0;

    /// 二标签问题的 Potts 代价矩阵.
    pub const POTTS_COST: [[i32; 2]; 2] = [[0, 1], [1, 0]];

    /// 图割默认迭代轮数. 负数表示迭代至收敛.
    pub const CUT_ITERATIONS: i32 = 3;

    /// 分割结果的空洞填充次数.
    pub const FILL_PASSES: usize = 2;
}

/// 肺部图谱相关常量.
pub mod atlas {
    /// 肺部先验二值化门限. 不小于该值的体素被视为肺部.
    pub const LUNG_PRIOR_THRESHOLD: f64 = 0.35;

    /// 二值化肺部先验的膨胀次数.
    pub const DILATION_ITERATIONS: usize = 2;

    /// 非肺部先验的截断上限.
    ///
    /// 注意它与其它 `[0, 1]` 概率的量纲不一致, 按原样保留.
    pub const NOT_LUNG_PRIOR_CAP: f64 = 100.0;

    /// 归一化项 (以及距离图) 中精确为零的位置会被替换为该值.
    pub const EPSILON: f64 = 1e-24;

    /// 计算到图谱距离时, 图谱的二值化门限.
    pub const DISTANCE_THRESHOLD: f64 = 0.5;

    /// 图谱个数 (左肺, 右肺).
    pub const ATLAS_COUNT: usize = 2;
}
