use clap::ValueEnum;
use coderag_search::GraphIntent;

#[derive(Copy, Clone, Debug, ValueEnum)]
pub(crate) enum IntentFlag {
    Callers,
    Calls,
    Chain,
    Impact,
}

impl IntentFlag {
    pub(crate) const fn as_domain(self) -> GraphIntent {
        match self {
            IntentFlag::Callers => GraphIntent::Callers,
            IntentFlag::Calls => GraphIntent::Calls,
            IntentFlag::Chain => GraphIntent::Chain,
            IntentFlag::Impact => GraphIntent::Impact,
        }
    }
}
