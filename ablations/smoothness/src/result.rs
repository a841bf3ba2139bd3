//! 实验结果.

use std::io::{self, Write};
use std::time::Duration;

/// 单个设置的运行结果.
pub enum Outcome {
    /// 分割成功.
    Done {
        left_dice: Option<f64>,
        right_dice: Option<f64>,
        conflicts: usize,
        elapsed: Duration,
    },

    /// 分割失败, 保存错误描述.
    Failed(String),
}

/// 将 `outcome` 的结果写进 `w` 中.
fn describe_into<W: Write>(name: &str, outcome: &Outcome, w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    #[inline]
    fn f64_to_display(f: Option<f64>) -> String {
        match f {
            Some(f) => format!("{f:.6}"),
            None => "/".to_string(),
        }
    }

    writeln!(w, "Setting `{name}`:")?;
    match outcome {
        Outcome::Done {
            left_dice,
            right_dice,
            conflicts,
            elapsed,
        } => {
            writeln!(w, "{S4}Left lung dice: {}", f64_to_display(*left_dice))?;
            writeln!(w, "{S4}Right lung dice: {}", f64_to_display(*right_dice))?;
            writeln!(w, "{S4}Conflicted voxels: {conflicts}")?;
            write!(w, "{S4}Total machine time: {} us", elapsed.as_micros())?;
        }
        Outcome::Failed(e) => write!(w, "{S4}Failed: {e}")?,
    }
    Ok(())
}

impl From<Result<Outcome, String>> for Outcome {
    fn from(r: Result<Outcome, String>) -> Self {
        r.unwrap_or_else(Outcome::Failed)
    }
}

/// 消融实验最终结果.
pub struct AblationResult {
    data: Vec<(&'static str, Outcome)>,
}

impl AblationResult {
    pub fn from_iter<I: IntoIterator<Item = (&'static str, Outcome)>>(it: I) -> Self {
        Self {
            data: it.into_iter().collect(),
        }
    }

    /// 分析运行结果.
    pub fn analyze(&self) {
        utils::sep();
        let mut buf = Vec::with_capacity(512);

        for (key, outcome) in self.data.iter() {
            describe_into(key, outcome, &mut buf).unwrap();
            println!("{}", String::from_utf8_lossy(&buf));
            buf.clear();

            utils::sep();
        }
    }
}
