//! Welford 算法 - 数值稳定的窗口统计
//!
//! 公式每个位置只看自己的窗口，所以这里按窗口一次性累积，
//! 结果只由窗口内容决定，与计算顺序无关。

/// 单变量统计 (均值/方差)
#[derive(Debug, Clone, Copy, Default)]
pub struct WelfordStats {
    pub count: u64,
    pub mean: f64,
    /// M2 = Σ(x - mean)²
    pub m2: f64,
}

impl WelfordStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_values(values: impl IntoIterator<Item = f64>) -> Self {
        let mut stats = Self::new();
        for x in values {
            stats.update(x);
        }
        stats
    }

    /// 增量更新
    pub fn update(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    /// 方差 (总体)
    pub fn variance(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.m2 / self.count as f64
        }
    }

    /// 标准差 (总体)
    pub fn std(&self) -> f64 {
        self.variance().sqrt()
    }
}

/// 双变量统计 (协方差)
#[derive(Debug, Clone, Copy, Default)]
pub struct CoMoments {
    pub a: WelfordStats,
    pub b: WelfordStats,
    /// C = Σ(a - mean_a)(b - mean_b)
    pub c: f64,
}

impl CoMoments {
    pub fn from_pairs(pairs: impl IntoIterator<Item = (f64, f64)>) -> Self {
        let mut moments = Self::default();
        for (a, b) in pairs {
            moments.update(a, b);
        }
        moments
    }

    pub fn update(&mut self, a: f64, b: f64) {
        let delta_a = a - self.a.mean;
        self.a.update(a);
        self.b.update(b);
        self.c += delta_a * (b - self.b.mean);
    }

    pub fn count(&self) -> u64 {
        self.a.count
    }

    /// 协方差 (总体)
    pub fn covariance(&self) -> f64 {
        if self.count() == 0 {
            0.0
        } else {
            self.c / self.count() as f64
        }
    }
}
