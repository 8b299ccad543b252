use std::sync::Arc;

use super::Plugin;
use crate::i18n::Translator;
use crate::models::Options;

/// 内置翻译插件名
pub const I18N_PLUGIN: &str = "i18n";

/// 创建翻译标记替换插件
///
/// 必须排在其他转换插件之前，后续插件看到的已经是替换后的文本。
pub fn i18n_plugin(translator: Arc<Translator>) -> Plugin {
    let mut options = Options::new();
    options.insert(
        "defaultLocale".to_string(),
        serde_yaml::Value::String(translator.default_locale().to_string()),
    );

    Plugin::new(I18N_PLUGIN)
        .with_options(options)
        .with_sync_transform(move |content, ctx| {
            let locale = ctx.locale.as_deref().unwrap_or(translator.default_locale());
            Ok(translator.resolve_markers(content, locale))
        })
}
