use proc_macro::TokenStream;
use quote::quote;
use syn::spanned::Spanned;
use syn::{FnArg, ImplItem, ImplItemFn, Item, Result, Type, parse_macro_input};

/// 单个 #[subscribe] 方法
struct Handler {
    method: syn::Ident,
    concurrent: bool,
    shape: Shape,
}

enum Shape {
    /// 唯一的事件参数 `&T`
    Event(Type),
    /// 事件参数个数不为 1
    BadArity(usize),
}

/// #[subscriber] 宏实现
/// - 仅作用于固有 `impl` 块（非 trait 实现）
/// - 去除方法上的 `#[subscribe]` 标注，并在 impl 块之后追加 `Subscriber` 实现
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    if !attr.is_empty() {
        return syn::Error::new(
            proc_macro2::Span::call_site(),
            "#[subscriber] does not take arguments",
        )
        .to_compile_error()
        .into();
    }

    let mut input = parse_macro_input!(item as Item);
    let item_impl = match &mut input {
        Item::Impl(i) if i.trait_.is_none() => i,
        other => {
            return syn::Error::new(
                other.span(),
                "#[subscriber] can only be used on inherent impl blocks",
            )
            .to_compile_error()
            .into();
        }
    };

    let mut handlers = Vec::new();
    for impl_item in &mut item_impl.items {
        if let ImplItem::Fn(method) = impl_item {
            match take_handler(method) {
                Ok(Some(handler)) => handlers.push(handler),
                Ok(None) => {}
                Err(err) => return err.to_compile_error().into(),
            }
        }
    }

    let self_ty = item_impl.self_ty.clone();
    let generics = item_impl.generics.clone();
    let (impl_generics, _, where_clause) = generics.split_for_impl();

    let declarations = handlers.iter().map(|handler| {
        let method = &handler.method;
        let name = method.to_string();
        match &handler.shape {
            Shape::Event(ty) if handler.concurrent => quote! {
                table.on_concurrent::<#ty, _, _>(#name, |this, event| Self::#method(this, event));
            },
            Shape::Event(ty) => quote! {
                table.on::<#ty, _, _>(#name, |this, event| Self::#method(this, event));
            },
            Shape::BadArity(arity) => quote! {
                table.bad_arity(#name, #arity);
            },
        }
    });

    let expanded = quote! {
        #input

        impl #impl_generics ::eventbus::subscriber::Subscriber for #self_ty #where_clause {
            #[allow(unused_variables)]
            fn handlers(table: &mut ::eventbus::subscriber::HandlerTable<Self>) {
                #( #declarations )*
            }
        }
    };

    TokenStream::from(expanded)
}

// 读取并移除方法上的 #[subscribe]
fn take_handler(method: &mut ImplItemFn) -> Result<Option<Handler>> {
    let mut marked = false;
    let mut concurrent = false;
    let mut retained = Vec::with_capacity(method.attrs.len());

    for attr in method.attrs.drain(..) {
        if !attr.path().is_ident("subscribe") {
            retained.push(attr);
            continue;
        }
        if marked {
            return Err(syn::Error::new(attr.path().span(), "duplicate #[subscribe]"));
        }
        marked = true;
        if let syn::Meta::List(_) = &attr.meta {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("concurrent") {
                    concurrent = true;
                    Ok(())
                } else {
                    Err(meta.error("unsupported subscribe option, expected `concurrent`"))
                }
            })?;
        }
    }
    method.attrs = retained;

    if !marked {
        return Ok(None);
    }

    let sig = &method.sig;
    if let Some(asyncness) = &sig.asyncness {
        return Err(syn::Error::new(
            asyncness.span(),
            "#[subscribe] handlers must be synchronous",
        ));
    }

    match sig.inputs.first() {
        Some(FnArg::Receiver(receiver))
            if receiver.reference.is_some() && receiver.mutability.is_none() => {}
        _ => {
            return Err(syn::Error::new(
                sig.ident.span(),
                "#[subscribe] handlers must take `&self`",
            ));
        }
    }

    let params: Vec<&Type> = sig
        .inputs
        .iter()
        .filter_map(|arg| match arg {
            FnArg::Typed(pat) => Some(pat.ty.as_ref()),
            FnArg::Receiver(_) => None,
        })
        .collect();

    let shape = match params.as_slice() {
        [Type::Reference(reference)] if reference.mutability.is_none() => {
            Shape::Event(reference.elem.as_ref().clone())
        }
        [other] => {
            return Err(syn::Error::new(
                other.span(),
                "event parameter must be a shared reference `&T`",
            ));
        }
        params => Shape::BadArity(params.len()),
    };

    Ok(Some(Handler {
        method: sig.ident.clone(),
        concurrent,
        shape,
    }))
}
